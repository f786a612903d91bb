// utils/validation.rs
use serde_json::Value;

/// Vérifier la présence des champs requis d'un corps JSON
///
/// Renvoie le premier champ manquant, dans l'ordre donné.
pub fn first_missing_field<'a>(body: &Value, fields: &[&'a str]) -> Option<&'a str> {
    fields
        .iter()
        .find(|field| body.get(**field).map(Value::is_null).unwrap_or(true))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_missing_field_follows_order() {
        let body = json!({"user_id": "u1", "text": "bio", "profile_id": null});
        let missing = first_missing_field(&body, &["user_id", "profile_type", "profile_id", "text"]);
        assert_eq!(missing, Some("profile_type"));

        let complete = json!({"user_id": "u1"});
        assert_eq!(first_missing_field(&complete, &["user_id"]), None);
    }

}
