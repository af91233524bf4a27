use crate::game::snake::SnakeInput;
use crate::game::world::WorldSnapshot;
use serde::Deserialize;
use std::f64::consts::TAU;

/// Identity reserved for the binary-snapshot test client.
pub const BINARY_SNAPSHOT_IDENTITY: &str = "meowboy";

/// One-time game-over notice; clients match on the raw bytes.
pub const DEAD_NOTICE: &[u8] = b"DEAD";

pub const DISCOVER_REPLY: &[u8] = br#"{"type":"DISCOVER_RECEIVED"}"#;

pub const MAX_IDENTITY_BYTES: usize = 64;

const INPUT_FRAME_LEN: usize = 32;
const INPUT_FRAME_TAG: &str = "INPUT";

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Discover,
    Join { uuid: String },
    Spectate { uuid: String },
    Heartbeat { uuid: String },
    Input { uuid: String, input: SnakeInput },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum TextMessage {
    #[serde(rename = "DISCOVER")]
    Discover,
    #[serde(rename = "JOIN")]
    Join { uuid: String },
    #[serde(rename = "SPECTATE")]
    Spectate { uuid: String },
    #[serde(rename = "HEARTBEAT")]
    Heartbeat { uuid: String },
    #[serde(rename = "INPUT")]
    Input { uuid: String, inp: SnakeInput },
}

fn is_valid_identity(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_IDENTITY_BYTES
}

/// Decodes an inbound datagram: text first, then the fixed 32-byte input
/// frame. Anything else is dropped. Messages carrying an out-of-bounds
/// identity are dropped before they can touch any table.
pub fn decode_datagram(data: &[u8]) -> Option<ClientMessage> {
    if let Ok(message) = serde_json::from_slice::<TextMessage>(data) {
        let message = match message {
            TextMessage::Discover => ClientMessage::Discover,
            TextMessage::Join { uuid } if is_valid_identity(&uuid) => {
                ClientMessage::Join { uuid }
            }
            TextMessage::Spectate { uuid } if is_valid_identity(&uuid) => {
                ClientMessage::Spectate { uuid }
            }
            TextMessage::Heartbeat { uuid } if is_valid_identity(&uuid) => {
                ClientMessage::Heartbeat { uuid }
            }
            TextMessage::Input { uuid, inp } if is_valid_identity(&uuid) => {
                ClientMessage::Input { uuid, input: inp }
            }
            _ => return None,
        };
        return Some(message);
    }
    decode_input_frame(data)
}

/// Little-endian 32-byte frame: 8-byte NUL-padded tag, 16-byte NUL-padded
/// identity, f32 angle, i32 boost flag.
fn decode_input_frame(data: &[u8]) -> Option<ClientMessage> {
    if data.len() != INPUT_FRAME_LEN {
        return None;
    }
    let mut reader = Reader::new(data);
    let tag = reader.read_padded_str::<8>()?;
    let uuid = reader.read_padded_str::<16>()?;
    let angle = reader.read_f32_le()?;
    let boost = reader.read_i32_le()?;
    if tag != INPUT_FRAME_TAG || !is_valid_identity(&uuid) {
        return None;
    }
    Some(ClientMessage::Input {
        uuid,
        input: SnakeInput {
            angle: Some(f64::from(angle)),
            boost: Some(boost != 0),
        },
    })
}

/// Maps an angle onto the full u16 range over one turn.
pub fn quantize_angle(angle: f64) -> u16 {
    ((angle.rem_euclid(TAU) / TAU) * 65535.0) as u16
}

/// Encodes the compact big-endian snapshot. Returns `None` when a count
/// exceeds its wire field; the caller falls back to the text form.
pub fn encode_snapshot_binary(snapshot: &WorldSnapshot) -> Option<Vec<u8>> {
    let mut encoder = Encoder::with_capacity(64 + snapshot.players.len() * 256);
    encoder.write_u16(u16::try_from(snapshot.players.len()).ok()?);
    for (id, player) in &snapshot.players {
        let id_bytes = id.as_bytes();
        encoder.write_u8(u8::try_from(id_bytes.len()).ok()?);
        encoder.write_bytes(id_bytes);
        encoder.write_f32(player.x as f32);
        encoder.write_f32(player.y as f32);
        encoder.write_u16(quantize_angle(player.angle));
        encoder.write_u8(u8::from(player.boost));
        encoder.write_f32(player.length as f32);
        encoder.write_u16(u16::try_from(player.segments.len()).ok()?);
        for segment in &player.segments {
            encoder.write_f32(segment[0] as f32);
            encoder.write_f32(segment[1] as f32);
        }
    }
    encoder.write_u16(u16::try_from(snapshot.food.len()).ok()?);
    for food in &snapshot.food {
        encoder.write_f32(food.x as f32);
        encoder.write_f32(food.y as f32);
        encoder.write_u8(food.size);
    }
    Some(encoder.into_vec())
}

struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    fn into_vec(self) -> Vec<u8> {
        self.buffer
    }

    fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn read_bytes<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.offset + N > self.data.len() {
            return None;
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.offset..self.offset + N]);
        self.offset += N;
        Some(out)
    }

    fn read_padded_str<const N: usize>(&mut self) -> Option<String> {
        let bytes = self.read_bytes::<N>()?;
        Some(
            String::from_utf8_lossy(&bytes)
                .trim_end_matches('\0')
                .to_string(),
        )
    }

    fn read_f32_le(&mut self) -> Option<f32> {
        Some(f32::from_le_bytes(self.read_bytes::<4>()?))
    }

    fn read_i32_le(&mut self) -> Option<i32> {
        Some(i32::from_le_bytes(self.read_bytes::<4>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::{FoodSnapshot, PlayerSnapshot};
    use std::collections::BTreeMap;

    fn read_u8(bytes: &[u8], offset: &mut usize) -> u8 {
        let value = bytes[*offset];
        *offset += 1;
        value
    }

    fn read_u16(bytes: &[u8], offset: &mut usize) -> u16 {
        let value = u16::from_be_bytes(bytes[*offset..*offset + 2].try_into().unwrap());
        *offset += 2;
        value
    }

    fn read_f32(bytes: &[u8], offset: &mut usize) -> f32 {
        let value = f32::from_be_bytes(bytes[*offset..*offset + 4].try_into().unwrap());
        *offset += 4;
        value
    }

    fn read_string(bytes: &[u8], offset: &mut usize) -> String {
        let len = read_u8(bytes, offset) as usize;
        let value = String::from_utf8(bytes[*offset..*offset + len].to_vec()).unwrap();
        *offset += len;
        value
    }

    fn decode_snapshot(bytes: &[u8]) -> WorldSnapshot {
        let mut offset = 0;
        let mut players = BTreeMap::new();
        let player_count = read_u16(bytes, &mut offset);
        for _ in 0..player_count {
            let uuid = read_string(bytes, &mut offset);
            let x = f64::from(read_f32(bytes, &mut offset));
            let y = f64::from(read_f32(bytes, &mut offset));
            let angle = f64::from(read_u16(bytes, &mut offset)) / 65535.0 * TAU;
            let boost = read_u8(bytes, &mut offset) != 0;
            let length = f64::from(read_f32(bytes, &mut offset));
            let segment_count = read_u16(bytes, &mut offset);
            let mut segments = Vec::with_capacity(segment_count as usize);
            for _ in 0..segment_count {
                let sx = f64::from(read_f32(bytes, &mut offset));
                let sy = f64::from(read_f32(bytes, &mut offset));
                segments.push([sx, sy]);
            }
            players.insert(
                uuid.clone(),
                PlayerSnapshot {
                    uuid,
                    x,
                    y,
                    angle,
                    boost,
                    length,
                    segments,
                },
            );
        }
        let food_count = read_u16(bytes, &mut offset);
        let mut food = Vec::with_capacity(food_count as usize);
        for _ in 0..food_count {
            let x = f64::from(read_f32(bytes, &mut offset));
            let y = f64::from(read_f32(bytes, &mut offset));
            let size = read_u8(bytes, &mut offset);
            food.push(FoodSnapshot { x, y, size });
        }
        assert_eq!(offset, bytes.len());
        WorldSnapshot { players, food }
    }

    fn input_frame(tag: &str, uuid: &str, angle: f32, boost: i32) -> Vec<u8> {
        let mut data = Vec::with_capacity(INPUT_FRAME_LEN);
        let mut tag_bytes = [0u8; 8];
        tag_bytes[..tag.len()].copy_from_slice(tag.as_bytes());
        data.extend_from_slice(&tag_bytes);
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes[..uuid.len()].copy_from_slice(uuid.as_bytes());
        data.extend_from_slice(&uuid_bytes);
        data.extend_from_slice(&angle.to_le_bytes());
        data.extend_from_slice(&boost.to_le_bytes());
        data
    }

    #[test]
    fn decodes_text_join() {
        let message = decode_datagram(br#"{"type":"JOIN","uuid":"kitty"}"#).expect("message");
        assert_eq!(
            message,
            ClientMessage::Join {
                uuid: "kitty".to_string()
            }
        );
    }

    #[test]
    fn decodes_text_spectate_heartbeat_discover() {
        assert_eq!(
            decode_datagram(br#"{"type":"SPECTATE","uuid":"watcher"}"#),
            Some(ClientMessage::Spectate {
                uuid: "watcher".to_string()
            })
        );
        assert_eq!(
            decode_datagram(br#"{"type":"HEARTBEAT","uuid":"watcher"}"#),
            Some(ClientMessage::Heartbeat {
                uuid: "watcher".to_string()
            })
        );
        assert_eq!(
            decode_datagram(br#"{"type":"DISCOVER"}"#),
            Some(ClientMessage::Discover)
        );
    }

    #[test]
    fn decodes_text_input() {
        let data = br#"{"type":"INPUT","uuid":"kitty","inp":{"angle":1.5,"boost":true}}"#;
        match decode_datagram(data).expect("message") {
            ClientMessage::Input { uuid, input } => {
                assert_eq!(uuid, "kitty");
                assert_eq!(input.angle, Some(1.5));
                assert_eq!(input.boost, Some(true));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn text_input_fields_are_optional() {
        let data = br#"{"type":"INPUT","uuid":"kitty","inp":{"boost":false}}"#;
        match decode_datagram(data).expect("message") {
            ClientMessage::Input { input, .. } => {
                assert_eq!(input.angle, None);
                assert_eq!(input.boost, Some(false));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn drops_unknown_and_malformed_text() {
        assert_eq!(decode_datagram(br#"{"type":"TELEPORT","uuid":"kitty"}"#), None);
        assert_eq!(decode_datagram(br#"{"uuid":"kitty"}"#), None);
        assert_eq!(decode_datagram(b"not json at all"), None);
        assert_eq!(decode_datagram(b""), None);
    }

    #[test]
    fn drops_out_of_bounds_identities() {
        let long_id = "k".repeat(65);
        let data = format!(r#"{{"type":"JOIN","uuid":"{long_id}"}}"#);
        assert_eq!(decode_datagram(data.as_bytes()), None);
        assert_eq!(decode_datagram(br#"{"type":"JOIN","uuid":""}"#), None);
    }

    #[test]
    fn decodes_binary_input_frame() {
        let data = input_frame("INPUT", "meowboy", 1.5, 1);
        assert_eq!(data.len(), INPUT_FRAME_LEN);
        match decode_datagram(&data).expect("message") {
            ClientMessage::Input { uuid, input } => {
                assert_eq!(uuid, "meowboy");
                assert_eq!(input.angle, Some(1.5));
                assert_eq!(input.boost, Some(true));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn binary_frame_zero_boost_is_false() {
        let data = input_frame("INPUT", "meowboy", -0.5, 0);
        match decode_datagram(&data).expect("message") {
            ClientMessage::Input { input, .. } => {
                assert_eq!(input.angle, Some(-0.5));
                assert_eq!(input.boost, Some(false));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn drops_binary_frames_with_wrong_tag_or_size() {
        assert_eq!(decode_datagram(&input_frame("NOTINPUT", "kitty", 0.0, 0)), None);
        assert_eq!(decode_datagram(&[0u8; 31]), None);
        assert_eq!(decode_datagram(&[0u8; 33]), None);
    }

    #[test]
    fn quantized_angle_covers_one_turn() {
        assert_eq!(quantize_angle(0.0), 0);
        assert_eq!(quantize_angle(TAU), 0);
        assert!(quantize_angle(TAU - 1e-6) >= 65534);
        let quarter = quantize_angle(TAU / 4.0);
        assert!((i32::from(quarter) - 16383).abs() <= 1);
        // negative headings land on the equivalent positive turn fraction
        let three_quarters = quantize_angle(-TAU / 4.0);
        assert!((i32::from(three_quarters) - 49151).abs() <= 1);
    }

    fn sample_snapshot() -> WorldSnapshot {
        let mut players = BTreeMap::new();
        players.insert(
            "kitty".to_string(),
            PlayerSnapshot {
                uuid: "kitty".to_string(),
                x: 1500.5,
                y: 250.25,
                angle: 1.0,
                boost: true,
                length: 60.0,
                segments: vec![[1500.5, 250.25], [1494.5, 250.25]],
            },
        );
        players.insert(
            "meowboy".to_string(),
            PlayerSnapshot {
                uuid: "meowboy".to_string(),
                x: 10.0,
                y: 20.0,
                angle: 0.0,
                boost: false,
                length: 48.0,
                segments: vec![[10.0, 20.0]],
            },
        );
        WorldSnapshot {
            players,
            food: vec![
                FoodSnapshot {
                    x: 1.0,
                    y: 2.0,
                    size: 3,
                },
                FoodSnapshot {
                    x: 2999.0,
                    y: 0.5,
                    size: 6,
                },
            ],
        }
    }

    #[test]
    fn binary_snapshot_round_trips() {
        let snapshot = sample_snapshot();
        let encoded = encode_snapshot_binary(&snapshot).expect("encoded");
        let decoded = decode_snapshot(&encoded);

        assert_eq!(decoded.food, snapshot.food);
        assert_eq!(decoded.players.len(), snapshot.players.len());
        for (id, player) in &snapshot.players {
            let round = &decoded.players[id];
            assert_eq!(round.uuid, player.uuid);
            assert_eq!(round.x, player.x);
            assert_eq!(round.y, player.y);
            assert_eq!(round.boost, player.boost);
            assert_eq!(round.length, player.length);
            assert_eq!(round.segments, player.segments);
            assert!((round.angle - player.angle).abs() <= TAU / 65535.0);
        }
    }

    #[test]
    fn binary_snapshot_rejects_overflowing_cardinalities() {
        let mut snapshot = sample_snapshot();
        snapshot.food = vec![
            FoodSnapshot {
                x: 0.0,
                y: 0.0,
                size: 3
            };
            65536
        ];
        assert_eq!(encode_snapshot_binary(&snapshot), None);

        let mut snapshot = sample_snapshot();
        let long_id = "k".repeat(300);
        snapshot.players.insert(
            long_id.clone(),
            PlayerSnapshot {
                uuid: long_id,
                x: 0.0,
                y: 0.0,
                angle: 0.0,
                boost: false,
                length: 60.0,
                segments: Vec::new(),
            },
        );
        assert_eq!(encode_snapshot_binary(&snapshot), None);
    }

    #[test]
    fn text_snapshot_matches_the_wire_shape() {
        let snapshot = sample_snapshot();
        let value = serde_json::to_value(&snapshot).expect("json");
        let kitty = &value["players"]["kitty"];
        assert_eq!(kitty["uuid"], "kitty");
        assert_eq!(kitty["x"], 1500.5);
        assert_eq!(kitty["boost"], true);
        assert_eq!(kitty["segments"][1][0], 1494.5);
        assert_eq!(value["food"][0]["size"], 3);
        assert_eq!(value["food"][1]["x"], 2999.0);
    }
}
