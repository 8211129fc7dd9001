use uuid::Uuid;

pub fn create_object_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_object_id_format() {
        let id = create_object_id("msg");
        assert!(id.starts_with("msg_"), "ID should start with 'msg_'");
        let expected_length = "msg_".len() + 32;
        assert_eq!(
            id.len(),
            expected_length,
            "ID length should be {} (prefix + '_' + 32 char UUID)",
            expected_length
        );
    }

    #[test]
    fn test_create_object_id_uniqueness() {
        assert_ne!(create_object_id("msg"), create_object_id("msg"));
    }
}
