//! 旧版迁移与导入导出集成测试

use std::path::Path;
use std::sync::Arc;

use linguana_cache::storage::legacy::write_legacy_data;
use linguana_cache::storage::{
    tables, ExtensionStorageFile, LegacyData, LegacySource, LocalStorageFile, TransferFormat,
};
use serde_json::{json, Value};

mod common {
    include!("common/mod.rs");
}

use common::{seed_english_german, TestEnvironment};

fn legacy_translations() -> Value {
    json!([
        ["good morning_DE_EN", {
            "originalText": "Good morning",
            "translatedText": "Guten Morgen",
            "sourceLanguage": "EN",
            "targetLanguage": "DE",
            "timestamp": 1_700_000_000_000u64
        }],
        ["danke_EN_DE", {
            "originalText": "Danke",
            "translatedText": "Thanks",
            "sourceLanguage": "de",
            "targetLanguage": "en",
            "messageType": "chat"
        }],
        ["bonjour_DE_FR", {
            "originalText": "Bonjour",
            "translatedText": "Hallo",
            "sourceLanguage": "FR",
            "targetLanguage": "DE"
        }],
        ["empty_DE_EN", {
            "originalText": "Empty",
            "sourceLanguage": "EN",
            "targetLanguage": "DE"
        }],
        "garbage"
    ])
}

fn legacy_reverse_translations() -> Value {
    json!([
        ["-1234", {
            "originalText": "Good morning",
            "translatedText": "Guten Morgen",
            "sourceLanguage": "EN",
            "targetLanguage": "DE",
            "originalMessageHash": "good morning_DE_EN"
        }],
        ["-5678", {
            "originalText": "Hola",
            "translatedText": "Hallo",
            "sourceLanguage": "ES",
            "targetLanguage": "DE"
        }]
    ])
}

fn write_extension_file(path: &Path, translations: Value, reverse: Value) {
    let content = json!({
        "maloum_translations_cache": translations,
        "maloum_reverse_translations_cache": reverse,
        "settings": {"theme": "dark"}
    });
    std::fs::write(path, content.to_string()).expect("Failed to write extension storage");
}

fn write_local_file(path: &Path, translations: Value) {
    let content = json!({
        "maloum_translations_cache": translations.to_string(),
    });
    std::fs::write(path, content.to_string()).expect("Failed to write local storage");
}

/// 迁移报告中的计数
#[test]
fn test_migration_report_counts() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let database = tables::open_database_file(temp_dir.path().join("cache.redb"))
        .expect("Failed to open database");

    let data = LegacyData::from_values(
        Some(&legacy_translations()),
        Some(&legacy_reverse_translations()),
    );
    let report = tables::write_atomically(&database, |txn| {
        write_legacy_data(txn, "extension-storage", &data)
    })
    .expect("Migration should succeed");

    assert_eq!(report.source, "extension-storage");
    assert_eq!(report.migrated, 2);
    // 回退的语言对、缺少译文的条目以及无法解析的元素
    assert_eq!(report.skipped, 3);
    assert_eq!(report.reverse_migrated, 1);
    assert_eq!(report.reverse_skipped, 1);
}

/// 初始化时从扩展存储迁移，并删除旧数据
#[tokio::test]
async fn test_migrates_from_extension_storage_on_startup() {
    let legacy_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let extension_path = legacy_dir.path().join("extension.json");
    write_extension_file(
        &extension_path,
        legacy_translations(),
        legacy_reverse_translations(),
    );

    let extension = Arc::new(ExtensionStorageFile::new(&extension_path));
    let sources: Vec<Arc<dyn LegacySource>> = vec![extension.clone() as Arc<dyn LegacySource>];
    let env = TestEnvironment::with_legacy_sources(sources);
    let store = &env.store;

    let all = store.load_all().await;
    assert_eq!(all.len(), 2);
    let morning = &all["good morning_DE_EN"];
    assert_eq!(morning.timestamp, 1_700_000_000_000);
    assert_eq!(morning.message_type, "migrated");
    assert_eq!(all["danke_EN_DE"].message_type, "chat");
    assert_eq!(all["danke_EN_DE"].source_language, "DE");

    let reverse = store.load_reverse_all().await;
    assert_eq!(reverse.len(), 1);
    assert!(reverse.contains_key("-1234"));

    // 旧数据已删除，其它键保留
    assert!(extension.load().expect("load should succeed").is_none());
    let remaining: Value = serde_json::from_str(
        &std::fs::read_to_string(&extension_path).expect("file should exist"),
    )
    .expect("valid json");
    assert_eq!(remaining["settings"]["theme"], "dark");
    assert!(remaining.get("maloum_translations_cache").is_none());

    // 再次迁移没有数据
    assert!(store.migrate_from_legacy_storage().await.is_none());

    let check = store.check_cache("Good morning", "DE", Some("EN")).await;
    assert!(check.found);
}

/// 只使用第一个有数据的来源
#[tokio::test]
async fn test_first_source_with_data_wins() {
    let legacy_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let extension_path = legacy_dir.path().join("extension.json");
    let local_path = legacy_dir.path().join("local.json");

    write_extension_file(
        &extension_path,
        json!([["hello_DE_EN", {"originalText": "Hello", "translatedText": "Hallo",
            "sourceLanguage": "EN", "targetLanguage": "DE"}]]),
        json!([]),
    );
    write_local_file(
        &local_path,
        json!([["bye_DE_EN", {"originalText": "Bye", "translatedText": "Tschüss",
            "sourceLanguage": "EN", "targetLanguage": "DE"}]]),
    );

    let local = Arc::new(LocalStorageFile::new(&local_path));
    let sources: Vec<Arc<dyn LegacySource>> = vec![
        Arc::new(ExtensionStorageFile::new(&extension_path)) as Arc<dyn LegacySource>,
        local.clone() as Arc<dyn LegacySource>,
    ];
    let env = TestEnvironment::with_legacy_sources(sources);

    let all = env.store.load_all().await;
    assert_eq!(all.len(), 1);
    assert!(all.contains_key("hello_DE_EN"));

    // 未使用的来源保持不变
    assert!(local.load().expect("load should succeed").is_some());
}

/// 扩展存储为空时使用本地存储
#[tokio::test]
async fn test_falls_back_to_local_storage() {
    let legacy_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let extension_path = legacy_dir.path().join("extension.json");
    let local_path = legacy_dir.path().join("local.json");

    write_extension_file(&extension_path, json!([]), json!([]));
    write_local_file(
        &local_path,
        json!([["bye_DE_EN", {"originalText": "Bye", "translatedText": "Tschüss",
            "sourceLanguage": "EN", "targetLanguage": "DE"}]]),
    );

    let local = Arc::new(LocalStorageFile::new(&local_path));
    let sources: Vec<Arc<dyn LegacySource>> = vec![
        Arc::new(ExtensionStorageFile::new(&extension_path)) as Arc<dyn LegacySource>,
        local.clone() as Arc<dyn LegacySource>,
    ];
    let env = TestEnvironment::with_legacy_sources(sources);

    let record = env
        .store
        .lookup_forward("Bye")
        .await
        .expect("Migrated entry should be found");
    assert_eq!(record.translated_text, "Tschüss");
    assert!(local.load().expect("load should succeed").is_none());
}

/// JSON 导出的文档结构
#[tokio::test]
async fn test_json_export_document() {
    let env = TestEnvironment::in_memory();
    seed_english_german(&env.store).await;

    let exported = env.store.export_data(TransferFormat::Json).await;
    let document: Value = serde_json::from_str(&exported).expect("Export should be valid JSON");

    assert_eq!(document["version"], "3.0");
    assert_eq!(document["supportedLanguagePairs"], "EN↔DE Only");
    assert_eq!(document["translations"].as_array().map(Vec::len), Some(5));
    assert_eq!(document["reverseTranslations"].as_array().map(Vec::len), Some(5));
    assert_eq!(document["filteredEntries"]["totalExported"], 10);
    assert_eq!(document["filteredEntries"]["invalidEntriesSkipped"], 0);
    assert!(document["exportDate"].as_str().is_some_and(|d| !d.is_empty()));

    let first = &document["translations"][0];
    assert!(first.get("hash").is_some());
    assert!(first.get("originalText").is_some());
}

/// JSON 导出后导入到新缓存，内容一致
#[tokio::test]
async fn test_json_export_import_round_trip() {
    let source = TestEnvironment::in_memory();
    seed_english_german(&source.store).await;
    assert!(source.store.store("Hallo Welt", "Hello world", "DE", "EN", None).await);

    let exported = source.store.export_data(TransferFormat::Json).await;

    let target = TestEnvironment::on_disk();
    let report = target.store.import_data(&exported, TransferFormat::Json).await;
    assert!(report.success, "Import failed: {:?}", report.error);
    assert_eq!(report.imported, 6);
    assert_eq!(report.skipped, 0);

    let original = source.store.load_all().await;
    let imported = target.store.load_all().await;
    assert_eq!(original.len(), imported.len());
    for (key, record) in &original {
        let copy = imported.get(key).expect("Imported entry should keep its key");
        assert_eq!(copy.original_text, record.original_text);
        assert_eq!(copy.translated_text, record.translated_text);
        assert_eq!(copy.source_language, record.source_language);
        assert_eq!(copy.target_language, record.target_language);
    }

    let check = target.store.check_cache("Hello world", "DE", Some("EN")).await;
    assert!(check.found && check.is_reverse);
}

/// JSON 导入跳过无效记录
#[tokio::test]
async fn test_json_import_skips_invalid_records() {
    let env = TestEnvironment::in_memory();
    let data = json!({
        "translations": [
            {"hash": "hi_DE_EN", "originalText": "Hi", "translatedText": "Hallo",
             "sourceLanguage": "EN", "targetLanguage": "DE"},
            {"hash": "x", "originalText": "Hola", "translatedText": "Hallo",
             "sourceLanguage": "ES", "targetLanguage": "DE"},
            {"hash": "y", "originalText": "Missing languages", "translatedText": "Fehlt"},
            {"originalText": "No hash", "translatedText": "Kein Hash",
             "sourceLanguage": "EN", "targetLanguage": "DE"},
            42
        ]
    });

    let report = env
        .store
        .import_data(&data.to_string(), TransferFormat::Json)
        .await;
    assert!(report.success);
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 4);

    let all = env.store.load_all().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all["hi_DE_EN"].message_type, "imported");
    assert!(env.store.lookup_reverse("Hallo").await.is_some());
}

/// CSV 导出只包含正向记录
#[tokio::test]
async fn test_csv_export() {
    let env = TestEnvironment::in_memory();
    assert!(env.store.store("Say \"hi\", please", "Sag \"hallo\", bitte", "EN", "DE", None).await);

    let csv = env.store.export_data(TransferFormat::Csv).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "Hash,Original Text,Translated Text,Source Language,Target Language,Message Type,Timestamp"
    );
    assert!(lines[1].starts_with("\"say hi please_DE_EN\",\"Say \"\"hi\"\", please\""));
}

/// CSV 导入兼容多种行格式
#[tokio::test]
async fn test_csv_import_is_lenient() {
    let env = TestEnvironment::in_memory();
    let csv = [
        "Hash,Original Text,Translated Text,Source Language,Target Language,Message Type,Timestamp",
        "\"\",\"Good evening\",\"Guten Abend\",\"EN\",\"DE\",\"\",\"0\"",
        "\"tschuess_EN_DE\",\"Tschüss\",\"Bye\",\"DE\",\"EN\",\"chat\",\"1\"",
        "Thank you,Danke",
        "",
        "lonely",
        "\"h\",\"Hola\",\"Hallo\",\"ES\",\"DE\",\"\",\"0\"",
    ]
    .join("\r\n");

    let report = env.store.import_data(&csv, TransferFormat::Csv).await;
    assert!(report.success);
    assert_eq!(report.imported, 3);
    assert_eq!(report.skipped, 2);

    let all = env.store.load_all().await;
    assert!(all.contains_key("good evening_DE_EN"));
    assert!(all.contains_key("tschüss_EN_DE"));
    assert!(all.contains_key("thank you_DE_EN"));
    assert_eq!(all["tschüss_EN_DE"].message_type, "chat");
    assert_eq!(all["thank you_DE_EN"].message_type, "imported");
}

/// CSV 导出后可以再导入
#[tokio::test]
async fn test_csv_round_trip() {
    let source = TestEnvironment::in_memory();
    seed_english_german(&source.store).await;
    let csv = source.store.export_data(TransferFormat::Csv).await;

    let target = TestEnvironment::in_memory();
    let report = target.store.import_data(&csv, TransferFormat::Csv).await;
    assert!(report.success);
    assert_eq!(report.imported, 5);
    assert_eq!(report.skipped, 0);

    let check = target
        .store
        .check_cache("Wie geht es dir?", "EN", Some("DE"))
        .await;
    assert!(check.found);
    assert_eq!(check.translation.as_deref(), Some("How are you?"));
}

/// 文本中的引号与换行在 CSV 导出导入后保持不变
#[tokio::test]
async fn test_csv_round_trip_preserves_quotes_and_newlines() {
    let source = TestEnvironment::in_memory();
    assert!(source.store.store("\"Hi\"", "\"Hallo\"", "EN", "DE", None).await);
    assert!(source.store.store("line1\nline2", "Zeile", "EN", "DE", None).await);
    let csv = source.store.export_data(TransferFormat::Csv).await;

    let target = TestEnvironment::in_memory();
    let report = target.store.import_data(&csv, TransferFormat::Csv).await;
    assert!(report.success);
    assert_eq!(report.imported, 2);
    assert_eq!(report.skipped, 0);

    let quoted = target
        .store
        .lookup_forward("\"Hi\"")
        .await
        .expect("quoted entry should be imported");
    assert_eq!(quoted.original_text, "\"Hi\"");
    assert_eq!(quoted.translated_text, "\"Hallo\"");

    let multiline = target
        .store
        .lookup_forward("line1\nline2")
        .await
        .expect("multiline entry should be imported");
    assert_eq!(multiline.original_text, "line1\nline2");
    assert_eq!(multiline.translated_text, "Zeile");

    let all = target.store.load_all().await;
    assert_eq!(all.len(), 2);
}
