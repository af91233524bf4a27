use super::constants::{
    COLLISION_RADIUS, CORPSE_FOOD_STRIDE, EAT_RADIUS_PAD, FOOD_COUNT, FOOD_SIZE_MAX,
    FOOD_SIZE_MIN, GROW_PER_FOOD, SEGMENT_SPACING,
};
use super::math::dist;
use super::snake::{Snake, SnakeInput};
use super::types::{Food, Vec2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::TAU;


/// The authoritative arena: every snake keyed by identity, plus the food set.
///
/// Snakes live in an ordered map so that tick-internal tie-breaks (two heads
/// reaching the same food) resolve in a stable identity order.
#[derive(Debug)]
pub struct World {
    pub(crate) width: f64,
    pub(crate) height: f64,
    pub(crate) players: BTreeMap<String, Snake>,
    pub(crate) food: Vec<Food>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub uuid: String,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub boost: bool,
    pub length: f64,
    pub segments: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoodSnapshot {
    pub x: f64,
    pub y: f64,
    pub size: u8,
}

/// Fully owned copy of the world state; later ticks do not reach into it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub players: BTreeMap<String, PlayerSnapshot>,
    pub food: Vec<FoodSnapshot>,
}

fn random_food(rng: &mut impl Rng, width: f64, height: f64) -> Food {
    Food {
        pos: Vec2 {
            x: rng.gen_range(0.0..width),
            y: rng.gen_range(0.0..height),
        },
        size: rng.gen_range(FOOD_SIZE_MIN..=FOOD_SIZE_MAX),
    }
}

fn corpse_food(rng: &mut impl Rng, pos: Vec2) -> Food {
    Food {
        pos,
        size: rng.gen_range(FOOD_SIZE_MIN..=FOOD_SIZE_MAX),
    }
}

impl World {
    pub fn new(width: f64, height: f64) -> Self {
        let mut rng = rand::thread_rng();
        let food = (0..FOOD_COUNT)
            .map(|_| random_food(&mut rng, width, height))
            .collect();
        Self {
            width,
            height,
            players: BTreeMap::new(),
            food,
        }
    }

    /// Creates a snake for `id` at a random spot with a random heading.
    /// A second join for a live identity keeps the existing snake.
    pub fn spawn_player(&mut self, id: &str) {
        if self.players.contains_key(id) {
            return;
        }
        let mut rng = rand::thread_rng();
        let head = Vec2 {
            x: rng.gen_range(0.0..self.width),
            y: rng.gen_range(0.0..self.height),
        };
        let angle = rng.gen_range(0.0..TAU);
        self.players.insert(id.to_string(), Snake::new(head, angle));
    }

    pub fn remove_player(&mut self, id: &str) {
        self.players.remove(id);
    }

    pub fn apply_input(&mut self, id: &str, input: &SnakeInput) {
        if let Some(snake) = self.players.get_mut(id) {
            snake.apply_input(input);
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn food_count(&self) -> usize {
        self.food.len()
    }

    /// One simulation step. Returns the identities that died this tick,
    /// already removed from the registry.
    pub fn tick(&mut self) -> Vec<String> {
        let mut rng = rand::thread_rng();

        for snake in self.players.values_mut() {
            snake.simulate(self.width, self.height);
        }

        // Eat: first snake in identity order wins a contested food.
        for snake in self.players.values_mut() {
            let head = snake.head;
            let reach = snake.speed + EAT_RADIUS_PAD;
            let before = self.food.len();
            self.food.retain(|food| dist(head, food.pos) > reach);
            let eaten = before - self.food.len();
            if eaten > 0 {
                snake.target_length += eaten as f64 * GROW_PER_FOOD * SEGMENT_SPACING;
            }
        }

        while self.food.len() < FOOD_COUNT {
            let food = random_food(&mut rng, self.width, self.height);
            self.food.push(food);
        }

        // Collide against a snapshot of every body so that head-on
        // encounters kill both sides in the same tick.
        let killed: Vec<String> = {
            let bodies: Vec<(&String, Vec2, Vec<Vec2>)> = self
                .players
                .iter()
                .map(|(id, snake)| (id, snake.head, snake.segments()))
                .collect();
            bodies
                .iter()
                .filter(|(id, head, _)| {
                    bodies.iter().any(|(other_id, _, segments)| {
                        *other_id != *id
                            && segments
                                .iter()
                                .any(|point| dist(*head, *point) <= COLLISION_RADIUS)
                    })
                })
                .map(|(id, _, _)| (*id).clone())
                .collect()
        };
        for id in &killed {
            if let Some(snake) = self.players.get_mut(id) {
                snake.dead = true;
            }
        }

        // Reap: corpses shed food along every 4th segment.
        let dead: Vec<String> = self
            .players
            .iter()
            .filter(|(_, snake)| snake.dead)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &dead {
            if let Some(snake) = self.players.remove(id) {
                for point in snake.segments().iter().step_by(CORPSE_FOOD_STRIDE) {
                    self.food.push(corpse_food(&mut rng, *point));
                }
                tracing::debug!(identity = %id, "snake died");
            }
        }
        dead
    }

    pub fn state(&self) -> WorldSnapshot {
        let players = self
            .players
            .iter()
            .map(|(id, snake)| {
                let snapshot = PlayerSnapshot {
                    uuid: id.clone(),
                    x: snake.head.x,
                    y: snake.head.y,
                    angle: snake.angle,
                    boost: snake.boosting,
                    length: snake.length,
                    segments: snake.segments().iter().map(|p| [p.x, p.y]).collect(),
                };
                (id.clone(), snapshot)
            })
            .collect();
        let food = self
            .food
            .iter()
            .map(|food| FoodSnapshot {
                x: food.pos.x,
                y: food.pos.y,
                size: food.size,
            })
            .collect();
        WorldSnapshot { players, food }
    }
}
