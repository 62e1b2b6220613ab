use anyhow::Result;
use push_dispatch::clients::certificate::{extract_first_topic, pem_to_der};

const WITH_TOPICS: &str = include_str!("fixtures/topics.pem");
const WITH_TOPICS_AND_KEY: &str = include_str!("fixtures/topics_with_key.pem");
const WITHOUT_TOPICS: &str = include_str!("fixtures/no_topics.pem");
const MALFORMED_TOPICS: &str = include_str!("fixtures/malformed_topics.pem");

/// Test: The first topic of the topics extension is returned
#[tokio::test]
async fn test_extracts_first_topic() -> Result<()> {
    assert_eq!(
        extract_first_topic(WITH_TOPICS).as_deref(),
        Some("com.example.app")
    );

    Ok(())
}

/// Test: A bundle with the private key ahead of the certificate still yields the topic
#[tokio::test]
async fn test_extracts_topic_from_key_bundle() -> Result<()> {
    assert_eq!(
        extract_first_topic(WITH_TOPICS_AND_KEY).as_deref(),
        Some("com.example.app")
    );

    Ok(())
}

/// Test: A certificate without the topics extension yields no topic
#[tokio::test]
async fn test_missing_extension_yields_none() -> Result<()> {
    assert_eq!(extract_first_topic(WITHOUT_TOPICS), None);

    Ok(())
}

/// Test: An extension whose contents do not parse yields no topic
#[tokio::test]
async fn test_unparseable_extension_yields_none() -> Result<()> {
    assert_eq!(extract_first_topic(MALFORMED_TOPICS), None);

    Ok(())
}

/// Test: Input without a certificate block is rejected
#[tokio::test]
async fn test_garbage_pem() -> Result<()> {
    assert_eq!(extract_first_topic("not a certificate"), None);
    assert!(pem_to_der("not a certificate").is_err());
    assert!(!pem_to_der(WITH_TOPICS)?.is_empty());

    Ok(())
}
