//! Variant table and prompt composition.
//!
//! Every prompt carries the same house rules: a fixed opening sequence, a
//! 4-6 line body and a footer the model must copy byte for byte. Only the
//! variation block changes between variants.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Sequence every caption must start with.
pub const OPENING_SEQUENCE: &str = ". . 𖥧 𖥧 .";

/// Footer the model is told to reproduce verbatim.
pub const FIXED_FOOTER: &str = "-----------------------

全国のハグ オーナーさまの暮らしをもっと見たい方は
プロフィールよりWEBをご覧ください！
@hughouse_official

ご質問ご相談等はDM・コメントへ
お気軽にどうぞ！

-----------------------";

/// One stylistic angle a draft is written from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Short id, eg `A`
    pub id: String,
    /// What this variant emphasises
    pub style_directive: String,
}

impl Variant {
    fn new(id: &str, style_directive: &str) -> Self {
        Self {
            id: id.to_string(),
            style_directive: style_directive.to_string(),
        }
    }
}

/// Problems with a variant table loaded from disk.
#[derive(Debug)]
pub enum VariantTableError {
    /// The file could not be read
    Io(std::io::Error),
    /// The JSON payload could not be parsed
    Parse(serde_json::Error),
    /// No variants were declared
    Empty,
    /// An id is blank or maps to the same webhook field as an earlier one
    InvalidId(String),
}

impl std::fmt::Display for VariantTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "Failed to read variants file: {err}"),
            Self::Parse(err) => write!(f, "Failed to parse variants JSON: {err}"),
            Self::Empty => write!(f, "Variant table is empty"),
            Self::InvalidId(id) => write!(f, "Duplicate or empty variant id: {id:?}"),
        }
    }
}

impl std::error::Error for VariantTableError {}

/// Webhook field a variant's draft is sent under, eg `post_a`.
pub fn draft_field_name(variant_id: &str) -> String {
    format!("post_{}", variant_id.trim().to_lowercase())
}

/// Ordered set of variants. Declaration order is draft order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VariantTable {
    variants: Vec<Variant>,
}

impl Default for VariantTable {
    fn default() -> Self {
        Self {
            variants: vec![
                Variant::new("A", "暮らしの情景重視（朝・夜・家族の動き）"),
                Variant::new("B", "空間ディテール重視（素材・色・光・質感）"),
                Variant::new("C", "短く余韻重視（言葉少なめで印象的）"),
            ],
        }
    }
}

impl VariantTable {
    /// Builds a table, rejecting empty tables, blank ids and ids that would
    /// share a webhook field (`A` and `a`).
    pub fn new(variants: Vec<Variant>) -> Result<Self, VariantTableError> {
        if variants.is_empty() {
            return Err(VariantTableError::Empty);
        }
        let mut seen = HashSet::new();
        for variant in &variants {
            let id = variant.id.trim();
            if id.is_empty() || !seen.insert(draft_field_name(id)) {
                return Err(VariantTableError::InvalidId(variant.id.clone()));
            }
        }
        Ok(Self { variants })
    }

    /// Parses a JSON array of `{"id", "style_directive"}` objects.
    pub fn from_json(raw: &str) -> Result<Self, VariantTableError> {
        let variants: Vec<Variant> = serde_json::from_str(raw).map_err(VariantTableError::Parse)?;
        Self::new(variants)
    }

    /// Loads the table from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, VariantTableError> {
        let raw = std::fs::read_to_string(path).map_err(VariantTableError::Io)?;
        Self::from_json(&raw)
    }

    /// Variants in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter()
    }

    /// Number of variants.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Always false for a validated table.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Directive for `id`, empty when the id is unknown.
    pub fn directive_for(&self, id: &str) -> &str {
        self.variants
            .iter()
            .find(|variant| variant.id == id)
            .map(|variant| variant.style_directive.as_str())
            .unwrap_or_default()
    }
}

/// Builds the full prompt for one variant. Never fails, an unknown id just
/// gets an empty directive.
pub fn compose_prompt(table: &VariantTable, variant_id: &str, space_type: &str, tone: &str) -> String {
    let directive = table.directive_for(variant_id);
    format!(
        "あなたはハウスメーカーの広報担当です。
施工例写真を観察し、Instagram投稿文を作成してください。

【今回のバリエーション】
{variant_id}：{directive}

【文章ルール】
・やさしく上品、暮らしが想像できる文体
・営業感、誇張表現は禁止（最安/No.1/絶対 など）
・冒頭は必ず「{OPENING_SEQUENCE}」
・本文は4〜6行、改行を保持
・絵文字は使わない

【指定（あれば反映）】
空間タイプ：{space_type}
トーン：{tone}

【固定フッター】※必ずこのまま
{FIXED_FOOTER}"
    )
    .trim()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_a_b_c() {
        let table = VariantTable::default();
        let ids: Vec<&str> = table.iter().map(|variant| variant.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn every_prompt_has_opening_and_footer() {
        let table = VariantTable::default();
        for variant in table.iter() {
            let prompt = compose_prompt(&table, &variant.id, "", "");
            assert!(prompt.contains(OPENING_SEQUENCE));
            assert!(prompt.ends_with(FIXED_FOOTER));
            assert!(prompt.contains(&variant.style_directive));
        }
    }

    #[test]
    fn hints_are_copied_verbatim() {
        let table = VariantTable::default();
        let prompt = compose_prompt(&table, "B", "LDK", "yasashii");
        assert!(prompt.contains("空間タイプ：LDK"));
        assert!(prompt.contains("トーン：yasashii"));
        assert!(prompt.contains("B：空間ディテール重視"));
    }

    #[test]
    fn sections_keep_their_order() {
        let table = VariantTable::default();
        let prompt = compose_prompt(&table, "A", "洗面", "上品");
        let preamble = prompt.find("広報担当").expect("preamble");
        let variation = prompt.find("【今回のバリエーション】").expect("variation");
        let rules = prompt.find("【文章ルール】").expect("rules");
        let hints = prompt.find("【指定（あれば反映）】").expect("hints");
        let footer = prompt.find(FIXED_FOOTER).expect("footer");
        assert!(preamble < variation && variation < rules && rules < hints && hints < footer);
    }

    #[test]
    fn unknown_variant_gets_empty_directive() {
        let table = VariantTable::default();
        let prompt = compose_prompt(&table, "Z", "", "");
        assert!(prompt.contains("Z：\n"));
        assert!(prompt.ends_with(FIXED_FOOTER));
    }

    #[test]
    fn table_rejects_duplicates_and_empty() {
        assert!(matches!(VariantTable::new(vec![]), Err(VariantTableError::Empty)));
        let dupes = vec![Variant::new("A", "one"), Variant::new("A", "two")];
        assert!(matches!(
            VariantTable::new(dupes),
            Err(VariantTableError::InvalidId(id)) if id == "A"
        ));
    }

    #[test]
    fn ids_differing_only_in_case_are_rejected() {
        let table = VariantTable::new(vec![Variant::new("A", "first"), Variant::new("a", "second")]);
        assert!(matches!(table, Err(VariantTableError::InvalidId(id)) if id == "a"));
        assert!(VariantTable::from_json(r#"[{"id": "X", "style_directive": ""}, {"id": " x ", "style_directive": ""}]"#).is_err());
    }

    #[test]
    fn draft_field_names_are_lowercased() {
        assert_eq!(draft_field_name("A"), "post_a");
        assert_eq!(draft_field_name("Night"), "post_night");
    }

    #[test]
    fn table_loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("variants.json");
        std::fs::write(
            &path,
            r#"[{"id": "X", "style_directive": "night"}, {"id": "Y", "style_directive": "morning"}]"#,
        )
        .expect("write variants");

        let table = VariantTable::from_file(&path).expect("load table");
        assert_eq!(table.len(), 2);
        assert_eq!(table.directive_for("Y"), "morning");
        assert_eq!(table.directive_for("A"), "");
    }
}
