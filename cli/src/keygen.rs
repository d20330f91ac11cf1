use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use callo::runtime::SessionKey;

use crate::KeyFormat;

pub fn run_keygen_command(format: KeyFormat) -> String {
    let key = STANDARD.encode(SessionKey::random().as_bytes());
    match format {
        KeyFormat::Base64 => key,
        KeyFormat::Toml => format!("[crypt]\nkey_base64 = \"{}\"", key),
    }
}
