use crate::error::ProtocolError;

/// Identity the relay uses as `from` on messages it originates.
pub const SERVER_IDENTITY: &str = "__server__";

pub const MAX_USERNAME_LEN: usize = 32;

/// Checks that `name` can be used as a relay identity and as a URL path segment.
pub fn validate_username(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() {
        return Err(ProtocolError::InvalidUsername {
            name: name.to_string(),
            reason: "username cannot be empty",
        });
    }
    if name.len() > MAX_USERNAME_LEN {
        return Err(ProtocolError::InvalidUsername {
            name: name.to_string(),
            reason: "username is too long",
        });
    }
    if name == SERVER_IDENTITY {
        return Err(ProtocolError::InvalidUsername {
            name: name.to_string(),
            reason: "username is reserved",
        });
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ProtocolError::InvalidUsername {
            name: name.to_string(),
            reason: "username may only contain ascii letters, digits, '-', '_' or '.'",
        });
    }
    Ok(())
}
