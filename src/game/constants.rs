pub const MAP_SIZE: f64 = 3000.0;
pub const TICK_MS: u64 = 16;
pub const BASE_SPEED: f64 = 4.0;
pub const BOOST_MULTIPLIER: f64 = 2.3;
pub const BOOST_COST: f64 = 0.09;
pub const SEGMENT_SPACING: f64 = 6.0;
pub const INITIAL_SEGMENTS: usize = 10;
pub const MIN_SEGMENTS: usize = 3;
pub const GROW_PER_FOOD: f64 = 1.0;
pub const TURN_SMOOTHING: f64 = 0.25;
pub const GROWTH_STEP: f64 = 0.6;
pub const HISTORY_MARGIN: usize = 300;
pub const BOOST_MIN_LENGTH: f64 = 8.0 * SEGMENT_SPACING;
pub const COLLISION_RADIUS: f64 = 8.0;
pub const EAT_RADIUS_PAD: f64 = 10.0;
pub const FOOD_COUNT: usize = 50;
pub const FOOD_SIZE_MIN: u8 = 3;
pub const FOOD_SIZE_MAX: u8 = 6;
pub const CORPSE_FOOD_STRIDE: usize = 4;
pub const PLAYER_TIMEOUT_MS: i64 = 10_000;
