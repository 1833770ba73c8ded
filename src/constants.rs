//! Limits, index names and validation constants

// Store defaults
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;
pub const DEFAULT_MAX_READERS: u32 = 126;
pub const MAX_DBS: u32 = 16;

// Length-prefixed keys store each part length in one byte
pub const MAX_KEY_PART: usize = 255;

// Uniqueness index fields
pub const FIELD_USERNAME: &str = "username";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_PHONE: &str = "phone";

// Validation bounds
pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 128;
pub const TEXT_MAX_LEN: usize = 255;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 32;
// E.164: "+" then up to 15 digits
pub const PHONE_MAX_DIGITS: usize = 15;

// Paging
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE: usize = 10_000;
pub const MAX_PAGE_SIZE: usize = 10_000;

// Parent id value the console sends for root menus
pub const NULL_PARENT: &str = "null";

pub const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

// Admin password digest: 16 random salt bytes, hex encoded, then sha256 hex
pub const SALT_LEN: usize = 16;
