use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

const JSON_DATA_URI_PREFIX: &str = "data:application/json;base64,";

/// Metadata the contract serves through `tokenURI` / `contractURI`,
/// base64-wrapped in a data URI. The `image` field is typically itself a
/// `data:image/svg+xml;base64,...` URI.
#[derive(Deserialize, Debug, Clone)]
pub struct TokenMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub image: String,
    #[serde(default)]
    pub attributes: Vec<TokenAttribute>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TokenAttribute {
    pub trait_type: String,
    pub value: serde_json::Value,
}

impl TokenAttribute {
    /// Attribute values are strings or numbers depending on the trait.
    pub fn value_text(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum MetadataError {
    NotADataUri,
    Base64(base64::DecodeError),
    Json(serde_json::Error),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::NotADataUri => {
                write!(f, "token URI is not a base64 JSON data URI")
            }
            MetadataError::Base64(e) => write!(f, "invalid base64 payload: {}", e),
            MetadataError::Json(e) => write!(f, "invalid metadata JSON: {}", e),
        }
    }
}

/// Decode a `data:application/json;base64,` token URI into metadata.
pub fn decode_token_uri(uri: &str) -> Result<TokenMetadata, MetadataError> {
    let payload = uri
        .strip_prefix(JSON_DATA_URI_PREFIX)
        .ok_or(MetadataError::NotADataUri)?;
    let bytes = STANDARD.decode(payload).map_err(MetadataError::Base64)?;
    serde_json::from_slice(&bytes).map_err(MetadataError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(json: &str) -> String {
        format!("{}{}", JSON_DATA_URI_PREFIX, STANDARD.encode(json))
    }

    #[test]
    fn decodes_pixel_metadata() {
        let uri = encode(
            r##"{"name":"Pixel (3,7)","description":"One pixel of the canvas","image":"data:image/svg+xml;base64,PHN2Zz48L3N2Zz4=","attributes":[{"trait_type":"Color","value":"#ff0000"},{"trait_type":"X","value":3}]}"##,
        );
        let metadata = decode_token_uri(&uri).unwrap();
        assert_eq!(metadata.name, "Pixel (3,7)");
        assert!(metadata.image.starts_with("data:image/svg+xml;base64,"));
        assert_eq!(metadata.attributes.len(), 2);
        assert_eq!(metadata.attributes[0].value_text(), "#ff0000");
        assert_eq!(metadata.attributes[1].value_text(), "3");
    }

    #[test]
    fn missing_optional_fields_default() {
        let uri = encode(r#"{"name":"Composite Pixel Art","image":"x"}"#);
        let metadata = decode_token_uri(&uri).unwrap();
        assert_eq!(metadata.description, "");
        assert!(metadata.attributes.is_empty());
    }

    #[test]
    fn rejects_non_data_uris() {
        assert!(matches!(
            decode_token_uri("https://example.com/metadata/7"),
            Err(MetadataError::NotADataUri)
        ));
    }

    #[test]
    fn rejects_bad_base64() {
        let uri = format!("{}%%%not-base64%%%", JSON_DATA_URI_PREFIX);
        assert!(matches!(
            decode_token_uri(&uri),
            Err(MetadataError::Base64(_))
        ));
    }
}
