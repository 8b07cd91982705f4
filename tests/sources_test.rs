use policy_monitor::sources::{
    contains_ai_terms, documents_from_feed, filter_ai_relevant, MAX_ENTRIES_PER_FEED,
};
use policy_monitor::types::SourceType;

fn rss_with_items(items: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Agency Newsroom</title>
    <description>Press releases</description>
    {items}
  </channel>
</rss>"#
    )
}

#[test]
fn entries_without_title_or_url_are_dropped() {
    let feed = rss_with_items(
        r#"
        <item>
          <title>Agency Releases AI Governance Framework</title>
          <link>https://example.gov/ai-framework</link>
          <description>New AI rules</description>
        </item>
        <item>
          <description>An entry with no title and no link</description>
        </item>
        "#,
    );

    let documents = documents_from_feed(&feed, "Agency", SourceType::AgencyRss).unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].title, "Agency Releases AI Governance Framework");
    assert_eq!(documents[0].url, "https://example.gov/ai-framework");
}

#[test]
fn only_first_ten_entries_are_kept() {
    let items: String = (0..15)
        .map(|i| {
            format!(
                "<item><title>Notice {i}</title><link>https://example.gov/notice/{i}</link></item>"
            )
        })
        .collect();
    let feed = rss_with_items(&items);

    let documents = documents_from_feed(&feed, "Agency", SourceType::AgencyRss).unwrap();
    assert_eq!(documents.len(), MAX_ENTRIES_PER_FEED);
}

#[test]
fn atom_entries_parse_like_rss_items() {
    let feed = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Commission Updates</title>
  <id>urn:feed:commission</id>
  <updated>2025-06-01T00:00:00Z</updated>
  <entry>
    <title>Commission Opens Consultation on AI Liability</title>
    <id>urn:entry:ai-liability</id>
    <link href="https://example.eu/ai-liability"/>
    <summary>Consultation on liability rules for AI systems</summary>
    <updated>2025-06-01T00:00:00Z</updated>
  </entry>
</feed>"#;

    let documents = documents_from_feed(feed, "European Commission", SourceType::EuCommission).unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].url, "https://example.eu/ai-liability");
    assert_eq!(documents[0].source_name, "European Commission");
}

#[test]
fn ai_filter_excludes_unrelated_entries() {
    let feed = rss_with_items(
        r#"
        <item>
          <title>Department Holds Bake Sale</title>
          <link>https://example.gov/bake-sale</link>
          <description>Cookies and brownies on the plaza</description>
        </item>
        <item>
          <title>Agency Releases AI Governance Framework</title>
          <link>https://example.gov/ai-framework</link>
          <description>Rules for automated systems</description>
        </item>
        "#,
    );

    let documents = documents_from_feed(&feed, "Agency", SourceType::AgencyRss).unwrap();
    let relevant = filter_ai_relevant(documents);

    assert_eq!(relevant.len(), 1);
    assert_eq!(relevant[0].title, "Agency Releases AI Governance Framework");
}

#[test]
fn ai_filter_matches_description_too() {
    let feed = rss_with_items(
        r#"
        <item>
          <title>New Procurement Notice</title>
          <link>https://example.gov/procurement</link>
          <description>Covers machine learning systems bought by the department</description>
        </item>
        "#,
    );

    let documents = documents_from_feed(&feed, "Agency", SourceType::AgencyRss).unwrap();
    let relevant = filter_ai_relevant(documents);
    assert_eq!(relevant.len(), 1);
}

#[test]
fn term_matching_is_case_insensitive_substring() {
    assert!(contains_ai_terms("ARTIFICIAL INTELLIGENCE act"));
    assert!(contains_ai_terms("new rules for generative ai tools"));
    assert!(contains_ai_terms("Large Language Model oversight"));
    assert!(!contains_ai_terms("bond refunding schedule"));
}
