use crate::constants::*;

pub fn validate_conv_id(conv_id: &str) -> Result<(), String> {
    let trimmed = conv_id.trim();
    if trimmed.is_empty() {
        return Err("Conversation id is required".into());
    }
    if trimmed.len() > MAX_CONV_ID_LENGTH {
        return Err(format!(
            "Conversation id must be at most {} characters",
            MAX_CONV_ID_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_client_msg_id(client_msg_id: &str) -> Result<(), String> {
    if client_msg_id.is_empty() {
        return Err("Client message id is required".into());
    }
    if client_msg_id.len() > MAX_CLIENT_MSG_ID_LENGTH {
        return Err(format!(
            "Client message id must be at most {} characters",
            MAX_CLIENT_MSG_ID_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_message_type(msg_type: &str) -> Result<(), String> {
    if MESSAGE_TYPES.contains(&msg_type) {
        Ok(())
    } else {
        Err(format!("Unknown message type: {}", msg_type))
    }
}

pub fn validate_payload_size(bytes: usize) -> Result<(), String> {
    if bytes == 0 {
        return Err("Payload is required".into());
    }
    if bytes > MAX_PAYLOAD_BYTES {
        return Err(format!(
            "Payload must be at most {} bytes",
            MAX_PAYLOAD_BYTES
        ));
    }
    Ok(())
}

pub fn validate_draft(draft: &str) -> Result<(), String> {
    if draft.len() > MAX_DRAFT_LENGTH {
        return Err(format!(
            "Draft must be at most {} characters",
            MAX_DRAFT_LENGTH
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conv_id_bounds() {
        assert!(validate_conv_id("c2c:u1:u2").is_ok());
        assert!(validate_conv_id("").is_err());
        assert!(validate_conv_id(&"x".repeat(MAX_CONV_ID_LENGTH + 1)).is_err());
    }

    #[test]
    fn message_types() {
        assert!(validate_message_type("text").is_ok());
        assert!(validate_message_type("stream").is_ok());
        assert!(validate_message_type("sticker").is_err());
    }

    #[test]
    fn payload_size() {
        assert!(validate_payload_size(2).is_ok());
        assert!(validate_payload_size(0).is_err());
        assert!(validate_payload_size(MAX_PAYLOAD_BYTES + 1).is_err());
    }
}
