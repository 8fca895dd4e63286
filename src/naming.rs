//! Artifact base-name derivation.

use once_cell::sync::Lazy;
use regex::Regex;

// Word runs immediately followed by a dot. Deliberately not a domain parser:
// the wildcard label and the terminal TLD never contribute.
static LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)\.").expect("label pattern"));

/// Derive the base name shared by all artifact files from the hostname set.
///
/// The longest hostname wins, first occurrence on ties. Its dot-suffixed
/// word runs are joined with `-` under a `cloudflare-` prefix:
/// `["*.example.com", "api.example.com"]` yields `cloudflare-api-example`.
pub fn derive_base_name(hostnames: &[String]) -> String {
    let longest = hostnames
        .iter()
        .fold("", |best, host| if host.len() > best.len() { host } else { best });
    let labels: Vec<&str> = LABEL_RE
        .captures_iter(longest)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect();
    format!("cloudflare-{}", labels.join("-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn longest_hostname_wins() {
        let name = derive_base_name(&hosts(&["a.example.com", "ab.example.com"]));
        assert_eq!(name, "cloudflare-ab-example");
    }

    #[test]
    fn first_max_breaks_ties() {
        let name = derive_base_name(&hosts(&["aa.example.com", "bb.example.com"]));
        assert_eq!(name, "cloudflare-aa-example");
    }

    #[test]
    fn wildcard_label_does_not_contribute() {
        let name = derive_base_name(&hosts(&["*.example.com", "example.com"]));
        assert_eq!(name, "cloudflare-example");
    }

    #[test]
    fn order_only_matters_for_ties() {
        let forward  = derive_base_name(&hosts(&["a.example.com", "api.example.com"]));
        let backward = derive_base_name(&hosts(&["api.example.com", "a.example.com"]));
        assert_eq!(forward, backward);
        assert_eq!(forward, "cloudflare-api-example");
    }
}
