use super::*;

fn raw(name: &str, price: Option<&str>) -> RawProductRecord {
    RawProductRecord {
        name: Some(name.to_owned()),
        price: price.map(str::to_owned),
        availability: Some("In Stock".to_owned()),
        product_url: Some("https://shop.example.com/p/1?utm_source=x&color=red".to_owned()),
        image_url: Some("//cdn.example.com/img/1.jpg".to_owned()),
        source_url: "https://shop.example.com/catalog".to_owned(),
    }
}

fn as_raw(cleaned: &CleanedProductRecord) -> RawProductRecord {
    RawProductRecord {
        name: Some(cleaned.name.clone()),
        price: cleaned.price.clone(),
        availability: Some(cleaned.availability.as_str().to_owned()),
        product_url: cleaned.product_url.clone(),
        image_url: cleaned.image_url.clone(),
        source_url: cleaned.source_url.clone(),
    }
}

// -----------------------------------------------------------------------
// clean_record / clean_products
// -----------------------------------------------------------------------

#[test]
fn clean_record_normalizes_every_field() {
    let cleaned = clean_record(&raw("  New! Blue   Mug (12 reviews)", Some("Now $1,299.00!"))).unwrap();
    assert_eq!(cleaned.name, "Blue Mug");
    assert_eq!(cleaned.price.as_deref(), Some("$1,299.00"));
    assert_eq!(cleaned.price_numeric, Some(1299.0));
    assert_eq!(cleaned.availability, Availability::InStock);
    assert_eq!(
        cleaned.product_url.as_deref(),
        Some("https://shop.example.com/p/1?color=red")
    );
    assert_eq!(
        cleaned.image_url.as_deref(),
        Some("https://cdn.example.com/img/1.jpg")
    );
    assert_eq!(cleaned.source_url, "https://shop.example.com/catalog");
}

#[test]
fn clean_record_drops_missing_or_short_names() {
    assert!(clean_record(&raw("X", Some("$5"))).is_none());
    assert!(clean_record(&raw("   ", Some("$5"))).is_none());

    let mut price_only = raw("ignored", Some("$5"));
    price_only.name = None;
    assert!(clean_record(&price_only).is_none());
}

#[test]
fn cleaning_is_idempotent() {
    let inputs = [
        raw("Sale: Widget (3 reviews) -", Some("1.234,56 €")),
        raw("Trending - Lamp", Some("USD 15")),
        raw("Plain Chair", Some("12,99")),
        raw("No Price Rug", None),
        raw(&"x".repeat(400), Some("$3")),
    ];
    for input in &inputs {
        let once = clean_record(input).unwrap();
        let twice = clean_record(&as_raw(&once)).unwrap();
        assert_eq!(once, twice, "cleaning {input:?} twice changed it");
    }
}

#[test]
fn clean_products_dedupes_on_name_and_price() {
    let records = vec![
        raw("Blue Mug", Some("$12.00")),
        raw("blue mug ", Some("$12.00")),
        raw("Blue Mug", Some("$14.00")),
        raw("Red Mug", Some("$12.00")),
    ];
    let cleaned = clean_products(&records);
    let keys: Vec<(String, Option<String>)> = cleaned.iter().map(CleanedProductRecord::dedup_key).collect();
    assert_eq!(
        keys,
        vec![
            ("blue mug".to_owned(), Some("$12.00".to_owned())),
            ("blue mug".to_owned(), Some("$14.00".to_owned())),
            ("red mug".to_owned(), Some("$12.00".to_owned())),
        ]
    );

    let unique: HashSet<_> = keys.iter().collect();
    assert_eq!(unique.len(), keys.len());
}

#[test]
fn dedupe_keeps_first_occurrence() {
    let first = clean_record(&raw("Blue Mug", Some("$12.00"))).unwrap();
    let mut second = first.clone();
    second.source_url = "https://shop.example.com/catalog?page=2".to_owned();
    let kept = dedupe(vec![first.clone(), second]);
    assert_eq!(kept, vec![first]);
}

// -----------------------------------------------------------------------
// clean_name
// -----------------------------------------------------------------------

#[test]
fn clean_name_strips_junk() {
    assert_eq!(clean_name("Best Seller | Oak Table"), "Oak Table");
    assert_eq!(clean_name("Oak Table 42 Reviews"), "Oak Table");
    assert_eq!(clean_name("Oak Table -"), "Oak Table");
    assert_eq!(clean_name("Newton Cradle"), "Newton Cradle");
}

#[test]
fn clean_name_truncates_long_names() {
    let long = "a".repeat(301);
    let cleaned = clean_name(&long);
    assert_eq!(cleaned.chars().count(), 300);
    assert!(cleaned.ends_with("..."));
    assert_eq!(clean_name(&"b".repeat(300)), "b".repeat(300));
}

// -----------------------------------------------------------------------
// prices
// -----------------------------------------------------------------------

#[test]
fn parse_price_numeric_examples() {
    assert_eq!(parse_price_numeric("$1,234.56"), Some(1234.56));
    assert_eq!(parse_price_numeric("1.234,56 €"), Some(1234.56));
    assert_eq!(parse_price_numeric("12,99"), Some(12.99));
    assert_eq!(parse_price_numeric("12,999"), Some(12999.0));
    assert_eq!(parse_price_numeric("£7.256"), Some(7.26));
    assert_eq!(parse_price_numeric("free"), None);
    assert_eq!(parse_price_numeric("1.234.567"), None);
}

#[test]
fn clean_price_keeps_price_shaped_text() {
    assert_eq!(clean_price("Price: $19.99 each").as_deref(), Some("$19.99"));
    assert_eq!(clean_price("1.234,56 €").as_deref(), Some("1.234,56 €"));
    assert_eq!(clean_price("USD 15").as_deref(), Some("15"));
    assert_eq!(clean_price("Call us, please"), None);
    assert_eq!(clean_price(""), None);
}

// -----------------------------------------------------------------------
// availability
// -----------------------------------------------------------------------

#[test]
fn normalize_availability_vocabulary() {
    assert_eq!(normalize_availability(None), Availability::Unknown);
    assert_eq!(normalize_availability(Some("  ")), Availability::Unknown);
    assert_eq!(normalize_availability(Some("Out of Stock")), Availability::OutOfStock);
    assert_eq!(normalize_availability(Some("Currently unavailable")), Availability::OutOfStock);
    assert_eq!(normalize_availability(Some("Not available online")), Availability::OutOfStock);
    assert_eq!(normalize_availability(Some("Available now")), Availability::InStock);
    assert_eq!(normalize_availability(Some("Coming soon")), Availability::PreOrder);
    assert_eq!(normalize_availability(Some("Only a few left!")), Availability::LimitedStock);
    assert_eq!(normalize_availability(Some("Limited Stock")), Availability::LimitedStock);
    assert_eq!(normalize_availability(Some("ask in store")), Availability::Unknown);
}

// -----------------------------------------------------------------------
// clean_url
// -----------------------------------------------------------------------

#[test]
fn clean_url_filters_and_strips_tracking() {
    assert_eq!(
        clean_url("https://shop.example.com/p/1?utm_source=mail&utm_medium=x").as_deref(),
        Some("https://shop.example.com/p/1")
    );
    assert_eq!(
        clean_url("https://shop.example.com/p/1?ref=home&size=m&tag=abc").as_deref(),
        Some("https://shop.example.com/p/1?size=m")
    );
    assert_eq!(
        clean_url("//cdn.example.com/a.jpg").as_deref(),
        Some("https://cdn.example.com/a.jpg")
    );
    assert_eq!(clean_url("/relative/path"), None);
    assert_eq!(clean_url("javascript:void(0)"), None);
}
