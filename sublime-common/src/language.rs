//! Supported display languages

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages offered by the language switcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Fr,
    #[default]
    En,
    Es,
    De,
    Ko,
    Zh,
    Ar,
}

impl Language {
    /// Switcher order
    pub const ALL: [Language; 7] = [
        Language::Fr,
        Language::En,
        Language::Es,
        Language::De,
        Language::Ko,
        Language::Zh,
        Language::Ar,
    ];

    /// ISO 639-1 code used on the wire (`lang=fr`)
    pub fn code(&self) -> &'static str {
        match self {
            Language::Fr => "fr",
            Language::En => "en",
            Language::Es => "es",
            Language::De => "de",
            Language::Ko => "ko",
            Language::Zh => "zh",
            Language::Ar => "ar",
        }
    }

    /// English language name, as given to the translation model
    pub fn english_name(&self) -> &'static str {
        match self {
            Language::Fr => "French",
            Language::En => "English",
            Language::Es => "Spanish",
            Language::De => "German",
            Language::Ko => "Korean",
            Language::Zh => "Chinese",
            Language::Ar => "Arabic",
        }
    }

    /// Placeholder phrases rotated while the intro gate is closed
    pub fn loading_phrases(&self) -> &'static [&'static str] {
        match self {
            Language::Fr => &[
                "Composition de l'ambiance...",
                "Accordage des couleurs...",
                "Écoute du silence...",
            ],
            Language::En => &[
                "Composing the ambiance...",
                "Tuning the colors...",
                "Listening to the silence...",
            ],
            Language::Es => &[
                "Componiendo el ambiente...",
                "Afinando los colores...",
                "Escuchando el silencio...",
            ],
            Language::De => &[
                "Die Stimmung wird komponiert...",
                "Die Farben werden gestimmt...",
                "Der Stille lauschen...",
            ],
            Language::Ko => &[
                "분위기를 작곡하는 중...",
                "색을 조율하는 중...",
                "고요함을 듣는 중...",
            ],
            Language::Zh => &[
                "正在谱写氛围...",
                "正在调和色彩...",
                "正在聆听寂静...",
            ],
            Language::Ar => &[
                "جارٍ تأليف الأجواء...",
                "جارٍ ضبط الألوان...",
                "الإصغاء إلى الصمت...",
            ],
        }
    }

    /// Right-to-left script
    pub fn is_rtl(&self) -> bool {
        matches!(self, Language::Ar)
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().to_ascii_lowercase();
        Language::ALL
            .iter()
            .copied()
            .find(|lang| lang.code() == code)
            .ok_or_else(|| Error::InvalidInput(format!("unsupported language: {:?}", s)))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
