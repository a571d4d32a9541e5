/*!
 * Tests for language code utilities
 */

use doctrans::language_utils::{
    LanguageCodeType, display_name, get_language_name, is_auto_detect, language_codes_match, normalize_to_part2t,
    validate_language_code, validate_language_tag,
};

#[test]
fn test_validateLanguageCode_withValidCodes_shouldReturnType() {
    assert_eq!(validate_language_code("en").unwrap(), LanguageCodeType::Part1);
    assert_eq!(validate_language_code("fra").unwrap(), LanguageCodeType::Part2T);
    assert_eq!(validate_language_code("ger").unwrap(), LanguageCodeType::Part2B);
}

#[test]
fn test_validateLanguageCode_withInvalidCodes_shouldFail() {
    assert!(validate_language_code("").is_err());
    assert!(validate_language_code("zz").is_err());
    assert!(validate_language_code("english").is_err());
}

#[test]
fn test_validateLanguageTag_withRegionSubtag_shouldPass() {
    assert!(validate_language_tag("pt-BR").is_ok());
    assert!(validate_language_tag("zh_Hant").is_ok());
    assert!(validate_language_tag("  ").is_err());
    assert!(validate_language_tag("xx-YY").is_err());
}

#[test]
fn test_normalizeToPart2t_shouldMapEveryForm() {
    assert_eq!(normalize_to_part2t("fr").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("FRA").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("de-AT").unwrap(), "deu");
}

#[test]
fn test_languageCodesMatch_shouldCompareNormalizedCodes() {
    assert!(language_codes_match("en", "eng"));
    assert!(language_codes_match("ger", "de"));
    assert!(!language_codes_match("en", "fr"));
    assert!(!language_codes_match("en", "invalid"));
}

#[test]
fn test_getLanguageName_shouldReturnEnglishName() {
    assert_eq!(get_language_name("es").unwrap(), "Spanish");
    assert!(get_language_name("zz").is_err());
}

#[test]
fn test_displayName_shouldHandleAutoAndRegions() {
    assert!(is_auto_detect("AUTO"));
    assert_eq!(display_name("auto"), "the detected source language");
    assert_eq!(display_name("pt-BR"), "Portuguese (pt-BR)");
    assert_eq!(display_name("x1-YY"), "x1-YY");
}
