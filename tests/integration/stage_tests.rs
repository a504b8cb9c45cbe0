use super::*;
use catalog_crawler::models::SubCategoryRef;
use catalog_crawler::pipeline::{CrawlSteps, ExtractOutcome};

#[tokio::test(start_paused = true)]
async fn test_category_page_yields_absolute_listing_urls() -> anyhow::Result<()> {
    let catalog = snacks_catalog().build();
    let steps = CrawlSteps::new(&test_config(SuspectPolicy::Flag))?;

    let found = steps
        .find_category_pages(&catalog.session(), &url("/snacks"))
        .await?;

    assert_eq!(
        found,
        vec![
            SubCategoryRef(url("/snacks/chips")),
            SubCategoryRef(url("/snacks/nuts")),
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_relative_entry_url_is_resolved() -> anyhow::Result<()> {
    let catalog = snacks_catalog().build();
    let steps = CrawlSteps::new(&test_config(SuspectPolicy::Flag))?;

    let found = steps.find_category_pages(&catalog.session(), "/snacks").await?;

    assert_eq!(found.len(), 2);
    assert_eq!(catalog.navigations_to("/snacks"), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_growing_listing_yields_every_product() -> anyhow::Result<()> {
    let catalog = snacks_catalog().build();
    let steps = CrawlSteps::new(&test_config(SuspectPolicy::Flag))?;

    let listing = steps
        .find_product_pages(&catalog.session(), &url("/snacks/chips"))
        .await?;

    assert!(!listing.partial);
    let urls: Vec<&str> = listing.products.iter().map(|p| p.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            url("/chips-a"),
            url("/chips-b"),
            url("/chips-c"),
            url("/chips-d"),
            url("/chips-e"),
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_endless_listing_returns_partial_set_at_deadline() -> anyhow::Result<()> {
    let catalog = CatalogBuilder::new()
        .endless_listing("/snacks/everything", "/snack")
        .build();
    let mut config = test_config(SuspectPolicy::Flag);
    config.scroll.deadline_ms = 2_000;
    config.scroll.settle_ms = 100;
    let steps = CrawlSteps::new(&config)?;

    let started = tokio::time::Instant::now();
    let listing = steps
        .find_product_pages(&catalog.session(), &url("/snacks/everything"))
        .await?;

    assert!(listing.partial);
    assert!(!listing.products.is_empty());
    assert!(started.elapsed() <= Duration::from_millis(2_100));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_product_page_becomes_validated_record() -> anyhow::Result<()> {
    let catalog = snacks_catalog().build();
    let steps = CrawlSteps::new(&test_config(SuspectPolicy::Flag))?;

    let outcome = steps
        .extract_product_info(&catalog.session(), &url("/chips-c"))
        .await?;

    let ExtractOutcome::Extracted(record) = outcome else {
        panic!("expected a record, got {:?}", outcome);
    };
    assert_eq!(record.name, "Chips C");
    assert_eq!(record.quantity.as_deref(), Some("50g"));
    assert_eq!(record.price, Some(19.5));
    assert_eq!(record.barcode.as_deref(), Some("EAN-13 8850000000034"));
    assert_eq!(record.images, vec!["https://assets.shop.test/2.jpg".to_string()]);
    assert_eq!(record.store_url, url("/chips-c"));
    assert!(record.flags.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_thousands_separator_price() -> anyhow::Result<()> {
    let catalog = snacks_catalog().build();
    let steps = CrawlSteps::new(&test_config(SuspectPolicy::Flag))?;

    let outcome = steps
        .extract_product_info(&catalog.session(), &url("/chips-d"))
        .await?;

    match outcome {
        ExtractOutcome::Extracted(record) => {
            assert_eq!(record.price, Some(1250.0));
            assert_eq!(record.quantity, None);
        }
        other => panic!("expected a record, got {:?}", other),
    }
    Ok(())
}
