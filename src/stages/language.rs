//! Supported languages and script-based language detection.

/// A language the relay can translate into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    /// ISO 639-1 code
    pub code: &'static str,
    /// English name
    pub name: &'static str,
    /// Name in the language itself, when it differs
    pub native: Option<&'static str>,
}

impl Language {
    const fn new(code: &'static str, name: &'static str, native: Option<&'static str>) -> Self {
        Self { code, name, native }
    }

    /// "Hindi (हिंदी)" style label for listings.
    pub fn display_name(&self) -> String {
        match self.native {
            Some(native) => format!("{} ({})", self.name, native),
            None => self.name.to_string(),
        }
    }
}

pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language::new("hi", "Hindi", Some("हिंदी")),
    Language::new("mr", "Marathi", Some("मराठी")),
    Language::new("ta", "Tamil", Some("தமிழ்")),
    Language::new("gu", "Gujarati", Some("ગુજરાતી")),
    Language::new("te", "Telugu", Some("తెలుగు")),
    Language::new("kn", "Kannada", Some("ಕನ್ನಡ")),
    Language::new("ml", "Malayalam", Some("മലയാളം")),
    Language::new("or", "Odia", Some("ଓଡ଼ିଆ")),
    Language::new("pa", "Punjabi", Some("ਪੰਜਾਬੀ")),
    Language::new("as", "Assamese", Some("অসমীয়া")),
    Language::new("bn", "Bengali", Some("বাংলা")),
    Language::new("en", "English", None),
    Language::new("es", "Spanish", Some("Español")),
    Language::new("fr", "French", Some("Français")),
    Language::new("de", "German", Some("Deutsch")),
    Language::new("it", "Italian", Some("Italiano")),
    Language::new("pt", "Portuguese", Some("Português")),
    Language::new("ru", "Russian", Some("Русский")),
    Language::new("ja", "Japanese", Some("日本語")),
    Language::new("ko", "Korean", Some("한국어")),
    Language::new("zh", "Chinese", Some("中文")),
    Language::new("ar", "Arabic", Some("العربية")),
];

/// Look up a supported language by code (case-insensitive).
pub fn find(code: &str) -> Option<&'static Language> {
    let code = code.trim();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|lang| lang.code.eq_ignore_ascii_case(code))
}

pub fn is_supported(code: &str) -> bool {
    find(code).is_some()
}

/// Normalize a recognizer-reported language to a supported code.
///
/// Accepts either a code ("en") or an English name ("English"). Returns
/// `None` for anything else, including "unknown".
pub fn resolve(language: &str) -> Option<&'static str> {
    let language = language.trim();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|lang| {
            lang.code.eq_ignore_ascii_case(language) || lang.name.eq_ignore_ascii_case(language)
        })
        .map(|lang| lang.code)
}

/// Unicode script blocks and the language each one is reported as.
const SCRIPT_RANGES: &[(char, char, &str)] = &[
    ('\u{0900}', '\u{097F}', "hi"), // Devanagari
    ('\u{0980}', '\u{09FF}', "bn"), // Bengali
    ('\u{0A00}', '\u{0A7F}', "pa"), // Gurmukhi
    ('\u{0A80}', '\u{0AFF}', "gu"), // Gujarati
    ('\u{0B00}', '\u{0B7F}', "or"), // Odia
    ('\u{0B80}', '\u{0BFF}', "ta"), // Tamil
    ('\u{0C00}', '\u{0C7F}', "te"), // Telugu
    ('\u{0C80}', '\u{0CFF}', "kn"), // Kannada
    ('\u{0D00}', '\u{0D7F}', "ml"), // Malayalam
    ('\u{0600}', '\u{06FF}', "ur"), // Arabic
];

/// Guess the language of `text` from the first script-specific character.
///
/// Scripts shared by several languages map to the most common one
/// (Devanagari is reported as Hindi). Text with Latin letters and no
/// other recognized script is reported as English; text with no letters
/// at all yields `None`.
pub fn detect_language(text: &str) -> Option<&'static str> {
    let mut saw_latin = false;
    for c in text.chars() {
        if let Some((_, _, code)) = SCRIPT_RANGES
            .iter()
            .find(|(start, end, _)| (*start..=*end).contains(&c))
        {
            return Some(code);
        }
        if c.is_ascii_alphabetic() {
            saw_latin = true;
        }
    }
    saw_latin.then_some("en")
}
