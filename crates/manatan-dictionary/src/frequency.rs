use serde_json::Value;

/// Rank from a frequency dictionary value, best effort.
///
/// Values arrive as numbers, strings such as `"1234"`, `"1234/56789"` or
/// `"12㋕"`, or `{ "value": .., "displayValue": .. }` objects. Anything
/// unparseable yields `None`.
pub fn parse_rank(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => leading_number(s),
        Value::Object(map) => map
            .get("value")
            .and_then(parse_rank)
            .or_else(|| map.get("displayValue").and_then(parse_rank)),
        _ => None,
    }
}

fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(|c| *c != ',')
        .collect();

    digits.parse().ok()
}

/// Text shown next to a frequency, the raw value as the dictionary wrote it.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => map
            .get("displayValue")
            .or_else(|| map.get("value"))
            .map(display_value)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyLevel {
    VeryCommon,
    Common,
    Uncommon,
    Rare,
    Unknown,
}

impl FrequencyLevel {
    pub fn from_rank(rank: Option<u32>) -> Self {
        match rank {
            Some(rank) if rank <= 1000 => FrequencyLevel::VeryCommon,
            Some(rank) if rank <= 5000 => FrequencyLevel::Common,
            Some(rank) if rank <= 10000 => FrequencyLevel::Uncommon,
            Some(_) => FrequencyLevel::Rare,
            None => FrequencyLevel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyLevel::VeryCommon => "Very Common",
            FrequencyLevel::Common => "Common",
            FrequencyLevel::Uncommon => "Uncommon",
            FrequencyLevel::Rare => "Rare",
            FrequencyLevel::Unknown => "Unknown",
        }
    }

    pub fn stars(&self) -> &'static str {
        match self {
            FrequencyLevel::VeryCommon => "★★★★★",
            FrequencyLevel::Common => "★★★★",
            FrequencyLevel::Uncommon => "★★★",
            FrequencyLevel::Rare => "★★",
            FrequencyLevel::Unknown => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ranks_from_mixed_shapes() {
        assert_eq!(parse_rank(&json!(1234)), Some(1234));
        assert_eq!(parse_rank(&json!(12.7)), Some(12));
        assert_eq!(parse_rank(&json!("1,234/56789")), Some(1234));
        assert_eq!(parse_rank(&json!("㋕ 58")), Some(58));
        assert_eq!(parse_rank(&json!({"value": 7, "displayValue": "7㋕"})), Some(7));
        assert_eq!(parse_rank(&json!({"displayValue": "88"})), Some(88));
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_rank(&json!("n/a")), None);
        assert_eq!(parse_rank(&json!(-5)), None);
        assert_eq!(parse_rank(&json!(null)), None);
        assert_eq!(parse_rank(&json!("99999999999")), None);
    }

    #[test]
    fn levels_bucket_ranks() {
        assert_eq!(FrequencyLevel::from_rank(Some(900)), FrequencyLevel::VeryCommon);
        assert_eq!(FrequencyLevel::from_rank(Some(20000)), FrequencyLevel::Rare);
        assert_eq!(FrequencyLevel::from_rank(None).stars(), "");
        assert_eq!(display_value(&json!({"value": 7, "displayValue": "7㋕"})), "7㋕");
    }
}
