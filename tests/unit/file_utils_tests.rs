/*!
 * Tests for job file handling
 */

use doctrans::file_utils::FileManager;
use doctrans::providers::mock::MockProvider;
use doctrans::translation::{JobOptions, JobResult, JobStatus, TranslationUnit};

use crate::common;

#[test]
fn test_readFragments_withNumberedFile_shouldKeepIdsAndOrder() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_fragments_file(dir.path(), "deck.json", 3).unwrap();

    let fragments = FileManager::read_fragments(&path).unwrap();

    let ids: Vec<&str> = fragments.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2", "s3"]);
    assert_eq!(fragments[2].text, common::fragment_text(3));
}

#[test]
fn test_readFragments_withMissingField_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "bad.json", r#"[{"id":"s1"}]"#).unwrap();

    assert!(FileManager::read_fragments(&path).is_err());
}

#[test]
fn test_readFragments_withMissingFile_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    assert!(FileManager::read_fragments(dir.path().join("absent.json")).is_err());
}

#[tokio::test]
async fn test_jobResult_writeThenRead_shouldPreserveUnits() {
    let provider = MockProvider::working();
    let (service, _cache) = common::service_with(&provider, common::test_options(5, 2));
    let units: Vec<TranslationUnit> = common::numbered_units(3);
    let result = service.translate_job(units, &JobOptions::new("en")).await.unwrap();

    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("out").join("deck.fr.json");
    FileManager::write_job_result(&path, &result).unwrap();
    let loaded: JobResult = FileManager::read_job_result(&path).unwrap();

    assert_eq!(loaded, result);
    assert_eq!(loaded.status(), JobStatus::Success);
    assert_eq!(loaded.translations().len(), 3);
}
