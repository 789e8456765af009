//! Identifiers shared by the integration tests.

pub const CHANNEL_ID: i64 = -1001;
pub const ADMIN_IDS: [i64; 2] = [11, 12];

pub const ITEM_1_ID: &str = "item-1";
pub const ITEM_2_ID: &str = "item-2";
pub const ITEM_3_ID: &str = "item-3";
