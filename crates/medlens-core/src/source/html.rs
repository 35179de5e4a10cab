//! `<img>` discovery in HTML pages.

use scraper::{Html, Selector};

/// Collect the `src` attribute of every `<img>` element, in document order.
///
/// Elements without a `src` (or with an empty one) are skipped. The parsed
/// document is dropped before returning; `scraper::Html` is not `Send`, so it
/// must never live across an `.await`.
pub fn collect_image_sources(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_in_document_order() {
        let html = r#"
            <html><body>
              <header><img src="/logo.png" alt="logo"></header>
              <article>
                <p>Text <img src="//cdn.example.com/figure-1.jpg"></p>
                <figure><img src="figures/2.webp"><figcaption>Fig 2</figcaption></figure>
              </article>
            </body></html>"#;

        assert_eq!(
            collect_image_sources(html),
            vec![
                "/logo.png".to_string(),
                "//cdn.example.com/figure-1.jpg".to_string(),
                "figures/2.webp".to_string(),
            ]
        );
    }

    #[test]
    fn test_skips_missing_and_empty_src() {
        let html = r#"<img alt="no src"><img src=""><img src="  "><img src="/ok.png">"#;
        assert_eq!(collect_image_sources(html), vec!["/ok.png".to_string()]);
    }

    #[test]
    fn test_malformed_html_still_parsed() {
        let html = "<div><img src='/a.png'><p>unclosed <img src=/b.png>";
        assert_eq!(
            collect_image_sources(html),
            vec!["/a.png".to_string(), "/b.png".to_string()]
        );
    }

    #[test]
    fn test_no_images() {
        assert!(collect_image_sources("<html><body>nothing</body></html>").is_empty());
        assert!(collect_image_sources("").is_empty());
    }
}
