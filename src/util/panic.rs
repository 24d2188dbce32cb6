//! Panic payload formatting.

use std::any::Any;

/// Render a `catch_unwind` payload as text for logging.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn test_static_str_payload() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static message");
    }

    #[test]
    fn test_formatted_payload() {
        let code = 7;
        let payload = panic::catch_unwind(|| panic!("failed with {code}")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "failed with 7");
    }

    #[test]
    fn test_opaque_payload() {
        let payload = panic::catch_unwind(|| std::panic::panic_any(42_u32)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
