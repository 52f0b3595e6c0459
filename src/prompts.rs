//! System prompts for LLM-based translation.
//!
//! Centralising prompts here keeps the default behaviour in one place and lets
//! unit tests inspect the rendered prompt without calling a provider.
//!
//! Callers can override the default via [`crate::config::ReflowConfig::system_prompt`];
//! the template here is used only when no override is provided.

/// Default translation prompt. `{target_lang}` is replaced with the
/// human-readable target language name.
pub const DEFAULT_TRANSLATION_PROMPT: &str = r#"You are a professional translator of academic papers, fluent in the terminology of medicine and computer science.
Translate the text you are given into {target_lang}, keeping technical terms accurate.

Rules:
1. Keep important technical terms in their original form in parentheses after the translation
2. Keep the formal register of an academic paper
3. The text is one paragraph cut out of a page layout; translate it as one paragraph
4. Output ONLY the translation. Do NOT add explanations, notes, quotes or Markdown fences"#;

/// Human-readable name for a language code; unknown codes are returned as-is.
pub fn language_name(code: &str) -> &str {
    match code.to_ascii_lowercase().as_str() {
        "zh" | "zh-cn" | "zh-hans" => "Simplified Chinese",
        "zh-tw" | "zh-hant" => "Traditional Chinese",
        "en" => "English",
        "ja" => "Japanese",
        "ko" => "Korean",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "ar" => "Arabic",
        _ => code,
    }
}

/// Render the default prompt for `target_lang`.
pub fn translation_prompt(target_lang: &str) -> String {
    DEFAULT_TRANSLATION_PROMPT.replace("{target_lang}", language_name(target_lang))
}
