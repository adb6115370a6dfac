//! Supported localization languages.

use serde::{Deserialize, Serialize};

/// A language the game ships localized text tables for.
///
/// Each variant owns one column in the `strings` table and one remote text
/// table (`TextResource<Lang>MB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Lang {
    EnUs,
    JaJp,
    KoKr,
    ZhTw,
    FrFr,
    DeDe,
    EsMx,
    PtBr,
    RuRu,
    ThTh,
    IdId,
    ViVn,
}

impl Lang {
    /// Every supported language, primary first.
    pub const ALL: [Lang; 12] = [
        Lang::EnUs,
        Lang::JaJp,
        Lang::KoKr,
        Lang::ZhTw,
        Lang::FrFr,
        Lang::DeDe,
        Lang::EsMx,
        Lang::PtBr,
        Lang::RuRu,
        Lang::ThTh,
        Lang::IdId,
        Lang::ViVn,
    ];

    /// Language whose column drives alt-group matching and the string diff log.
    pub const PRIMARY: Lang = Lang::EnUs;

    /// Column name in the `strings` table.
    pub fn column(self) -> &'static str {
        match self {
            Lang::EnUs => "en_us",
            Lang::JaJp => "ja_jp",
            Lang::KoKr => "ko_kr",
            Lang::ZhTw => "zh_tw",
            Lang::FrFr => "fr_fr",
            Lang::DeDe => "de_de",
            Lang::EsMx => "es_mx",
            Lang::PtBr => "pt_br",
            Lang::RuRu => "ru_ru",
            Lang::ThTh => "th_th",
            Lang::IdId => "id_id",
            Lang::ViVn => "vi_vn",
        }
    }

    /// Remote master table holding this language's text rows.
    pub fn text_table(self) -> &'static str {
        match self {
            Lang::EnUs => "TextResourceEnUsMB",
            Lang::JaJp => "TextResourceJaJpMB",
            Lang::KoKr => "TextResourceKoKrMB",
            Lang::ZhTw => "TextResourceZhTwMB",
            Lang::FrFr => "TextResourceFrFrMB",
            Lang::DeDe => "TextResourceDeDeMB",
            Lang::EsMx => "TextResourceEsMxMB",
            Lang::PtBr => "TextResourcePtBrMB",
            Lang::RuRu => "TextResourceRuRuMB",
            Lang::ThTh => "TextResourceThThMB",
            Lang::IdId => "TextResourceIdIdMB",
            Lang::ViVn => "TextResourceViVnMB",
        }
    }

    /// Reverse of [`Lang::text_table`].
    pub fn from_text_table(name: &str) -> Option<Lang> {
        Lang::ALL.into_iter().find(|lang| lang.text_table() == name)
    }
}
