//! Sender domain extraction from `From` headers

use crate::models::{MessageHeaders, SenderDomain};

/// Split a `From` header into display name and address.
///
/// Handles `Name <user@host>`, `"Quoted, Name" <user@host>` and bare `user@host`.
fn parse_from_header(header: &str) -> (String, String) {
    if let (Some(start), Some(end)) = (header.rfind('<'), header.rfind('>')) {
        if start < end {
            let name = header[..start].trim().trim_matches('"').to_string();
            let email = header[start + 1..end].trim().to_string();
            return (name, email);
        }
    }
    (String::new(), header.trim().to_string())
}

/// Derives the sender domain used to group messages per label
#[derive(Debug, Default, Clone, Copy)]
pub struct SenderDomainExtractor;

impl SenderDomainExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Domain part (after the last '@') of the sender address, lowercased.
    /// Returns `None` when the header holds no usable domain.
    pub fn extract(&self, from_header: &str) -> Option<SenderDomain> {
        let (_, email) = parse_from_header(from_header);
        let (_, domain) = email.rsplit_once('@')?;
        let domain = domain.trim().trim_end_matches('.');

        if domain.is_empty() {
            return None;
        }

        SenderDomain::parse(domain).ok()
    }

    pub fn extract_from(&self, headers: &MessageHeaders) -> Option<SenderDomain> {
        headers.from.as_deref().and_then(|from| self.extract(from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(header: &str) -> Option<String> {
        SenderDomainExtractor::new()
            .extract(header)
            .map(|d| d.as_str().to_string())
    }

    #[test]
    fn test_parse_from_header() {
        assert_eq!(
            parse_from_header("John Doe <john@example.com>"),
            ("John Doe".to_string(), "john@example.com".to_string())
        );
        assert_eq!(
            parse_from_header("\"Doe, John\" <john@example.com>"),
            ("Doe, John".to_string(), "john@example.com".to_string())
        );
        assert_eq!(
            parse_from_header(" john@example.com "),
            (String::new(), "john@example.com".to_string())
        );
    }

    #[test]
    fn test_extract_named_and_bare_addresses() {
        assert_eq!(extract("Shop <News@Shop.COM>").as_deref(), Some("shop.com"));
        assert_eq!(
            extract("\"Support, Team\" <help@mail.example.org>").as_deref(),
            Some("mail.example.org")
        );
        assert_eq!(extract("alerts@bank.com").as_deref(), Some("bank.com"));
    }

    #[test]
    fn test_extract_uses_last_at_sign() {
        assert_eq!(
            extract("\"a@b\" <user@real.com>").as_deref(),
            Some("real.com")
        );
        assert_eq!(extract("odd@name@host.net").as_deref(), Some("host.net"));
    }

    #[test]
    fn test_extract_rejects_headers_without_domain() {
        assert_eq!(extract(""), None);
        assert_eq!(extract("Mailer Daemon"), None);
        assert_eq!(extract("user@"), None);
        assert_eq!(extract("Name <>"), None);
        assert_eq!(extract("x <user@bad host>"), None);
    }

    #[test]
    fn test_extract_from_headers() {
        let extractor = SenderDomainExtractor::new();
        let headers = MessageHeaders {
            id: "m1".to_string(),
            from: Some("Deals <deals@store.com>".to_string()),
            label_ids: vec![],
        };
        assert_eq!(
            extractor.extract_from(&headers).map(|d| d.to_string()),
            Some("store.com".to_string())
        );

        let no_from = MessageHeaders {
            id: "m2".to_string(),
            ..Default::default()
        };
        assert!(extractor.extract_from(&no_from).is_none());
    }
}
