//! End-to-end import runs against a mock feed and media server

use httpmock::prelude::*;
use serde_json::{json, Value};
use sspc_import::config::{Config, RemoveAction};
use sspc_import::feeds::{SspcFeed, SspcFile};
use sspc_import::hooks::{ChangeLogHook, ImportEvent, ImportHook};
use sspc_import::import::{self, ImportLog, Importer};
use sspc_import::media::{HttpFetcher, StorageMode};
use sspc_import::store::{AssetId, EntityId, EntityMetaStore, EntityStore, LocalStore, MetaValue, TaxonomyStore};
use sspc_import::Error;
use std::sync::{Arc, Mutex};

/// Collects every event it sees
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<ImportEvent>>>);

impl Recorder {
    fn events(&self) -> Vec<ImportEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl ImportHook for Recorder {
    fn on_event(&mut self, event: &ImportEvent, _log: &mut ImportLog) {
        self.0.lock().unwrap().push(event.clone());
    }
}

fn base_config() -> Config {
    let mut config = Config::from_toml(
        r#"
        import_id = "1"
        primary_office_id = "90"

        [mappings.property_type]
        House = "11"

        [mappings.price_qualifier]
        "Guide Price" = "21"

        [mappings.availability]
        "For Sale" = "31"
        "To Let" = "32"

        [offices]
        B2 = "91"
        "#,
    )
    .unwrap();
    config.media.timeout_secs = 5;
    config
}

async fn serve_media(server: &MockServer, paths: &[&str]) {
    for path in paths {
        let path = path.to_string();
        server
            .mock_async(|when, then| {
                when.method(GET).path(path.as_str());
                then.status(200).body(format!("bytes of {}", path));
            })
            .await;
    }
}

fn sale(server: &MockServer, id: &str, price: &str, photos: &[&str]) -> Value {
    json!({
        "id": id,
        "address": "<b>1</b> High Street",
        "postcode": "AB1 2CD",
        "summary": "A fine house",
        "description": "Line one.\nLine two.",
        "latitude": "52.1",
        "longitude": "-1.2",
        "property_category": "0",
        "transaction_type": "1",
        "bedrooms": 3,
        "property_type": "House",
        "price": price,
        "pricetype": "Guide Price",
        "status_name": "For Sale",
        "branchID": "B2",
        "feature_1": "Garden",
        "gallery": photos
            .iter()
            .map(|p| json!({ "gallery_photo": server.url(*p) }))
            .collect::<Vec<_>>(),
        "assets": {
            "item1": { "url": server.url("/docs/brochure.pdf"), "type_id": "4" }
        }
    })
}

fn letting(id: &str) -> Value {
    json!({
        "id": id,
        "address": "2 Low Road",
        "latitude": 51.0,
        "longitude": 0.5,
        "property_category": 0,
        "transaction_type": 2,
        "price": "£950 pcm",
        "pricetype": "POA",
        "status_name": "To Let",
        "property_type": "Maisonette"
    })
}

async fn serve_feed(server: &MockServer, path: &str, properties: Vec<Value>) {
    let path = path.to_string();
    server
        .mock_async(|when, then| {
            when.method(GET).path(path.as_str());
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "property": properties }));
        })
        .await;
}

fn assets(store: &LocalStore, entity: EntityId, key: &str) -> Vec<AssetId> {
    store
        .get_meta(entity, key)
        .and_then(|v| v.as_assets().map(<[AssetId]>::to_vec))
        .unwrap_or_default()
}

#[tokio::test]
async fn test_first_import_maps_fields_and_downloads_media() {
    let server = MockServer::start_async().await;
    serve_media(&server, &["/img/1.jpg", "/img/2.jpg", "/docs/brochure.pdf"]).await;
    serve_feed(
        &server,
        "/feed.json",
        vec![sale(&server, "S1", "£250,000", &["/img/1.jpg?w=800", "/img/2.jpg"]), letting("L1")],
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStore::open(dir.path()).await.unwrap();
    let fetcher = HttpFetcher::new().unwrap();
    let config = base_config();
    let recorder = Recorder::default();

    let feed = SspcFeed::new(server.url("/feed.json")).unwrap();
    let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
    importer.add_hook(Box::new(recorder.clone()));
    let summary = import::run(&mut importer, &feed).await.unwrap();
    let log = importer.into_log();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.media.new, 3);
    assert_eq!(summary.errors, 0);

    let sale_id = store.find_by_meta("_imported_ref_1", "S1").unwrap();
    let record = store.record(sale_id).unwrap();
    assert_eq!(record.title, "1 High Street");
    assert_eq!(record.excerpt, "A fine house");

    assert_eq!(store.meta_text(sale_id, "_department"), "residential-sales");
    assert_eq!(store.meta_text(sale_id, "_price"), "250000");
    assert_eq!(store.meta_text(sale_id, "_poa"), "");
    assert_eq!(store.meta_text(sale_id, "_bedrooms"), "3");
    assert_eq!(store.meta_text(sale_id, "_address_country"), "GB");
    assert_eq!(store.meta_text(sale_id, "_latitude"), "52.1");
    assert_eq!(store.meta_text(sale_id, "_office_id"), "91");
    assert_eq!(store.meta_text(sale_id, "_features"), "1");
    assert_eq!(store.meta_text(sale_id, "_feature_0"), "Garden");
    assert_eq!(store.meta_text(sale_id, "_room_description_0"), "Line one.Line two.");
    assert_eq!(store.meta_text(sale_id, "_on_market"), "yes");

    let terms = store.terms_snapshot(sale_id);
    assert_eq!(terms["property_type"], vec!["11".to_string()]);
    assert_eq!(terms["price_qualifier"], vec!["21".to_string()]);
    assert_eq!(terms["availability"], vec!["31".to_string()]);

    let photos = assets(&store, sale_id, "_photos");
    assert_eq!(photos.len(), 2);
    let first_photo = store.asset_path(photos[0]).unwrap();
    assert_eq!(std::fs::read_to_string(first_photo).unwrap(), "bytes of /img/1.jpg");
    assert_eq!(assets(&store, sale_id, "_brochures").len(), 1);
    assert!(assets(&store, sale_id, "_floorplans").is_empty());

    let letting_id = store.find_by_meta("_imported_ref_1", "L1").unwrap();
    assert_eq!(store.meta_text(letting_id, "_department"), "residential-lettings");
    assert_eq!(store.meta_text(letting_id, "_rent"), "950");
    assert_eq!(store.meta_text(letting_id, "_rent_frequency"), "pcm");
    assert_eq!(store.meta_text(letting_id, "_poa"), "yes");
    assert_eq!(store.meta_text(letting_id, "_office_id"), "90");
    assert!(store.terms_snapshot(letting_id)["property_type"].is_empty());

    assert!(log.contains("Property received with a type (Maisonette) that is not mapped"));
    assert!(log.contains("Imported 2 photos (2 new, 0 existing, 0 deleted)"));

    let imported: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|e| matches!(e, ImportEvent::PropertyImported { inserted: true, .. }))
        .collect();
    assert_eq!(imported.len(), 2);
}

#[tokio::test]
async fn test_reimport_reuses_media_and_retires_stale_listings() {
    let server = MockServer::start_async().await;
    serve_media(&server, &["/img/1.jpg", "/img/2.jpg", "/img/3.jpg", "/docs/brochure.pdf"]).await;
    serve_feed(
        &server,
        "/first.json",
        vec![
            sale(&server, "S1", "250000", &["/img/1.jpg", "/img/2.jpg"]),
            sale(&server, "S2", "300000", &["/img/2.jpg", "/img/3.jpg"]),
        ],
    )
    .await;
    serve_feed(
        &server,
        "/second.json",
        vec![sale(&server, "S1", "260000", &["/img/2.jpg?v=2", "/img/3.jpg"])],
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStore::open(dir.path()).await.unwrap();
    let fetcher = HttpFetcher::new().unwrap();
    let mut config = base_config();
    config.remove_action = RemoveAction::RemoveAllMediaExceptFirstImage;

    {
        let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
        let feed = SspcFeed::new(server.url("/first.json")).unwrap();
        import::run(&mut importer, &feed).await.unwrap();
    }

    let s1 = store.find_by_meta("_imported_ref_1", "S1").unwrap();
    let s2 = store.find_by_meta("_imported_ref_1", "S2").unwrap();
    let s1_photos_before = assets(&store, s1, "_photos");
    let s2_photos_before = assets(&store, s2, "_photos");

    let recorder = Recorder::default();
    let (summary, log) = {
        let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
        importer.add_hook(Box::new(ChangeLogHook));
        importer.add_hook(Box::new(recorder.clone()));
        let feed = SspcFeed::new(server.url("/second.json")).unwrap();
        let summary = import::run(&mut importer, &feed).await.unwrap();
        (summary, importer.into_log())
    };

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.removed, 1);

    // S1: photo 2 reused, photo 3 new, photo 1 deleted
    let s1_photos = assets(&store, s1, "_photos");
    assert_eq!(s1_photos.len(), 2);
    assert_eq!(s1_photos[0], s1_photos_before[1]);
    assert!(!s1_photos_before.contains(&s1_photos[1]));
    assert!(store.asset_path(s1_photos_before[0]).is_none());
    assert!(log.contains("Imported 2 photos (1 new, 1 existing, 1 deleted)"));
    assert!(log.contains("Imported 1 brochures (0 new, 1 existing, 0 deleted)"));
    assert!(log.contains("Updated price. Before: 250000, After: 260000"));

    // S2: off the market, only its first photo kept
    assert_eq!(store.meta_text(s2, "_on_market"), "");
    assert_eq!(assets(&store, s2, "_photos"), vec![s2_photos_before[0]]);
    assert!(assets(&store, s2, "_brochures").is_empty());
    assert!(store.asset_path(s2_photos_before[1]).is_none());
    assert!(log.contains(&format!("Property {} marked as not on market", s2)));

    assert!(recorder.events().iter().any(|e| matches!(
        e,
        ImportEvent::PropertyRemoved { reference, .. } if reference == "S2"
    )));
}

#[tokio::test]
async fn test_failed_media_removal_keeps_asset_attached() {
    let server = MockServer::start_async().await;
    serve_media(&server, &["/img/1.jpg", "/img/2.jpg", "/docs/brochure.pdf"]).await;
    serve_feed(
        &server,
        "/first.json",
        vec![
            sale(&server, "S1", "250000", &["/img/1.jpg"]),
            sale(&server, "S2", "300000", &["/img/2.jpg"]),
        ],
    )
    .await;
    serve_feed(&server, "/second.json", vec![sale(&server, "S1", "250000", &["/img/1.jpg"])]).await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStore::open(dir.path()).await.unwrap();
    let fetcher = HttpFetcher::new().unwrap();
    let mut config = base_config();
    config.remove_action = RemoveAction::RemoveAllMedia;

    {
        let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
        let feed = SspcFeed::new(server.url("/first.json")).unwrap();
        import::run(&mut importer, &feed).await.unwrap();
    }

    let s2 = store.find_by_meta("_imported_ref_1", "S2").unwrap();
    let mut photos = assets(&store, s2, "_photos");
    photos.insert(0, AssetId(999));
    store.set_meta(s2, "_photos", MetaValue::Assets(photos.clone()));

    let (summary, log) = {
        let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
        let feed = SspcFeed::new(server.url("/second.json")).unwrap();
        let summary = import::run(&mut importer, &feed).await.unwrap();
        (summary, importer.into_log())
    };

    assert_eq!(summary.removed, 1);
    assert_eq!(summary.errors, 1);
    assert!(log.contains("Failed to delete _photos with asset ID 999"));
    assert_eq!(assets(&store, s2, "_photos"), vec![AssetId(999)]);
    assert!(store.asset_path(photos[1]).is_none());
    assert!(assets(&store, s2, "_brochures").is_empty());
}

#[tokio::test]
async fn test_dont_remove_keeps_listings_on_market() {
    let server = MockServer::start_async().await;
    serve_feed(&server, "/first.json", vec![letting("L1"), letting("L2")]).await;
    serve_feed(&server, "/second.json", vec![letting("L1")]).await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStore::open(dir.path()).await.unwrap();
    let fetcher = HttpFetcher::new().unwrap();
    let mut config = base_config();
    config.dont_remove = true;

    for path in ["/first.json", "/second.json"] {
        let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
        let feed = SspcFeed::new(server.url(path)).unwrap();
        let summary = import::run(&mut importer, &feed).await.unwrap();
        assert_eq!(summary.removed, 0);
    }

    let l2 = store.find_by_meta("_imported_ref_1", "L2").unwrap();
    assert_eq!(store.meta_text(l2, "_on_market"), "yes");
}

#[tokio::test]
async fn test_manually_added_listings_are_never_retired() {
    let server = MockServer::start_async().await;
    serve_feed(&server, "/feed.json", vec![letting("L1")]).await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStore::open(dir.path()).await.unwrap();
    let manual = store
        .insert(sspc_import::store::EntityRecord {
            title: "Manual".into(),
            excerpt: String::new(),
            status: sspc_import::store::EntityStatus::Publish,
        })
        .unwrap();
    store.set_meta(manual, "_on_market", MetaValue::from("yes"));

    let fetcher = HttpFetcher::new().unwrap();
    let config = base_config();
    let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
    let feed = SspcFeed::new(server.url("/feed.json")).unwrap();
    let summary = import::run(&mut importer, &feed).await.unwrap();
    drop(importer);

    assert_eq!(summary.removed, 0);
    assert_eq!(store.meta_text(manual, "_on_market"), "yes");
}

#[tokio::test]
async fn test_failed_media_download_does_not_abort_listing() {
    let server = MockServer::start_async().await;
    serve_media(&server, &["/img/1.jpg", "/docs/brochure.pdf"]).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/img/broken.jpg");
            then.status(404);
        })
        .await;
    serve_feed(
        &server,
        "/feed.json",
        vec![sale(&server, "S1", "100000", &["/img/1.jpg", "/img/broken.jpg"])],
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStore::open(dir.path()).await.unwrap();
    let fetcher = HttpFetcher::new().unwrap();
    let config = base_config();

    let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
    let feed = SspcFeed::new(server.url("/feed.json")).unwrap();
    let summary = import::run(&mut importer, &feed).await.unwrap();
    let log = importer.into_log();

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.errors, 1);
    let error = log.errors().next().unwrap();
    assert_eq!(error.agent_ref.as_deref(), Some("S1"));
    assert!(error.message.contains("/img/broken.jpg"));

    let s1 = store.find_by_meta("_imported_ref_1", "S1").unwrap();
    assert_eq!(assets(&store, s1, "_photos").len(), 1);
}

#[tokio::test]
async fn test_url_reference_mode_downloads_nothing() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let feed_path = dir.path().join("feed.json");
    let document = json!({ "property": [sale(&server, "S1", "1", &["/img/1.jpg?x=1", "/img/2.jpg"])] });
    tokio::fs::write(&feed_path, document.to_string()).await.unwrap();

    let mut store = LocalStore::open(dir.path().join("store")).await.unwrap();
    let fetcher = HttpFetcher::new().unwrap();
    let mut config = base_config();
    config.media.photos = StorageMode::UrlReference;
    config.media.brochures = StorageMode::UrlReference;

    let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
    let summary = import::run(&mut importer, &SspcFile::new(&feed_path)).await.unwrap();
    drop(importer);

    assert_eq!(summary.media.new, 0);
    assert_eq!(store.asset_count(), 0);

    let s1 = store.find_by_meta("_imported_ref_1", "S1").unwrap();
    assert_eq!(
        store.get_meta(s1, "_photo_urls"),
        Some(MetaValue::Urls(vec![server.url("/img/1.jpg"), server.url("/img/2.jpg")]))
    );
}

#[tokio::test]
async fn test_missing_coordinates_are_geocoded() {
    let server = MockServer::start_async().await;
    let geocode = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/geocode")
                .query_param("address", "3 Mill Lane, ZZ1 1ZZ");
            then.status(200).json_body(json!({
                "status": "OK",
                "results": [{ "geometry": { "location": { "lat": 53.5, "lng": -2.25 } } }]
            }));
        })
        .await;
    serve_feed(
        &server,
        "/feed.json",
        vec![json!({ "id": "G1", "address": "3 Mill Lane", "postcode": "ZZ1 1ZZ" })],
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStore::open(dir.path()).await.unwrap();
    let fetcher = HttpFetcher::new().unwrap();
    let mut config = base_config();
    config.google_maps_api_key = Some("key".to_string());
    config.geocode.base_url = server.url("/geocode");

    for _ in 0..2 {
        let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
        let feed = SspcFeed::new(server.url("/feed.json")).unwrap();
        import::run(&mut importer, &feed).await.unwrap();
    }

    // Stored coordinates are not looked up again
    geocode.assert_hits_async(1).await;

    let g1 = store.find_by_meta("_imported_ref_1", "G1").unwrap();
    assert_eq!(store.meta_text(g1, "_latitude"), "53.5");
    assert_eq!(store.meta_text(g1, "_longitude"), "-2.25");
}

#[tokio::test]
async fn test_no_api_key_skips_geocoding() {
    let dir = tempfile::tempdir().unwrap();
    let feed_path = dir.path().join("feed.json");
    tokio::fs::write(&feed_path, r#"{"property":[{"id":"G2","address":"4 Mill Lane"}]}"#)
        .await
        .unwrap();

    let mut store = LocalStore::open(dir.path().join("store")).await.unwrap();
    let fetcher = HttpFetcher::new().unwrap();
    let config = base_config();

    let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
    import::run(&mut importer, &SspcFile::new(&feed_path)).await.unwrap();

    assert!(importer
        .log()
        .contains("Not performing Google Geocoding request as no API key present in settings"));
}

#[tokio::test]
async fn test_invalid_feed_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let feed_path = dir.path().join("feed.json");
    tokio::fs::write(&feed_path, "<xml>not json</xml>").await.unwrap();

    let mut store = LocalStore::open(dir.path().join("store")).await.unwrap();
    let fetcher = HttpFetcher::new().unwrap();
    let config = base_config();

    let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
    let result = import::run(&mut importer, &SspcFile::new(&feed_path)).await;
    drop(importer);

    assert!(matches!(result, Err(Error::Feed(_))));
    assert_eq!(store.entity_count(), 0);
}

#[tokio::test]
async fn test_commercial_listing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let feed_path = dir.path().join("feed.json");
    let document = json!({ "property": [{
        "id": "C1",
        "address": "Unit 4, Trade Park",
        "latitude": "50.1",
        "longitude": "-3.9",
        "property_category": "1",
        "transaction_type": "2",
        "price": "£12,500 per annum",
        "pricetype": "per calendar month"
    }]});
    tokio::fs::write(&feed_path, document.to_string()).await.unwrap();

    let mut store = LocalStore::open(dir.path().join("store")).await.unwrap();
    let fetcher = HttpFetcher::new().unwrap();
    let config = base_config();

    let mut importer = Importer::new(&config, &mut store, &fetcher).unwrap();
    import::run(&mut importer, &SspcFile::new(&feed_path)).await.unwrap();
    drop(importer);

    let c1 = store.find_by_meta("_imported_ref_1", "C1").unwrap();
    assert_eq!(store.meta_text(c1, "_department"), "commercial");
    assert_eq!(store.meta_text(c1, "_for_sale"), "");
    assert_eq!(store.meta_text(c1, "_to_rent"), "yes");
    assert_eq!(store.meta_text(c1, "_rent_from"), "12500");
    assert_eq!(store.meta_text(c1, "_rent_units"), "pcm");
    assert_eq!(store.meta_text(c1, "_commercial_rent_currency"), "GBP");
    assert_eq!(store.meta_text(c1, "_floor_area_units"), "sqft");
    assert!(store.get_meta(c1, "_bedrooms").is_none());
}
