//! Known transcription artifacts to strip from STT output.
//!
//! Whisper-family models trained on subtitled video occasionally hallucinate
//! these credit lines into silence or low-confidence segments; see
//! <https://github.com/openai/whisper/discussions/1536>. The list is a fixed
//! part of the contract between this client and whatever STT backend sits
//! behind `STT_ENDPOINT` — it is not configurable.
pub const DATASET_BIAS: &[&str] = &[
    "Untertitelung aufgrund der Amara.org-Community",
    "Untertitel im Auftrag des ZDF für funk, 2017",
    "Untertitel von Stephanie Geiges",
    "Untertitel der Amara.org-Community",
    "Untertitel  der  Amara .org -Community",
    "Untertitel im Auftrag des ZDF, 2017",
    "Untertitel im Auftrag des ZDF, 2020",
    "Untertitel im Auftrag des ZDF, 2018",
    "Untertitel im Auftrag des ZDF, 2021",
    "Untertitelung im Auftrag des ZDF, 2021",
    "Copyright WDR 2021",
    "Copyright WDR 2020",
    "Copyright WDR 2019",
    "SWR 2021",
    "SWR 2020",
];

/// Strip every known bias phrase out of a raw transcript chunk.
pub fn strip_bias(text: &str) -> String {
    let mut cleaned = text.to_string();
    for phrase in DATASET_BIAS {
        cleaned = cleaned.replace(phrase, "");
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_phrase() {
        let raw = "Hallo Untertitel von Stephanie Geiges Welt";
        assert_eq!(strip_bias(raw), "Hallo  Welt");
    }

    #[test]
    fn leaves_clean_text_untouched() {
        let raw = "guten morgen wie geht es dir";
        assert_eq!(strip_bias(raw), raw);
    }
}
