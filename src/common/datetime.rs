use chrono::{DateTime, Utc};

/// Relógio do servidor; nenhum timestamp de criação/alteração vem do cliente.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

pub fn parse_iso_safe(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Dias inteiros desde `since` (usado em "dias com o usuário" dos vínculos).
pub fn days_since(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - since).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn parse_and_days() {
        assert!(parse_iso_safe("não é data").is_none());
        let start = parse_iso_safe("2024-03-01T10:00:00-03:00").unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-01T13:00:00+00:00");
        assert_eq!(days_since(start, start + Duration::hours(49)), 2);
    }
}
