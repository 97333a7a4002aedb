pub mod error;
pub mod openrouter;
pub mod util;

pub use error::{AiError, Result};
pub use openrouter::{Message, MessageRole, OpenRouter};
pub use util::{extract_json_object, truncate_to_char_boundary};
