//! FB2 genre-code lookup.
//!
//! The FB2 scheme ships a fixed taxonomy of genre codes; shared by the FB2
//! and EPUB extractors. Unmapped codes fall back to the literal code,
//! title-cased, so a record never loses its genre entirely.

use std::collections::HashMap;
use std::sync::LazyLock;

static GENRES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("adv_animal", "Nature and Animals"),
        ("adv_geo", "Travel and Geography"),
        ("adv_history", "Historical Adventure"),
        ("adv_indian", "Western"),
        ("adv_maritime", "Maritime Adventure"),
        ("adv_modern", "Modern Adventure"),
        ("adv_story", "Picaresque"),
        ("adv_western", "Western"),
        ("adventure", "Adventure"),
        ("antique", "Antique Literature"),
        ("antique_ant", "Classical Antiquity"),
        ("antique_east", "Ancient Eastern Literature"),
        ("antique_european", "Early European Literature"),
        ("antique_myths", "Myths, Legends and Epics"),
        ("antique_russian", "Early Russian Literature"),
        ("aphorisms", "Aphorisms"),
        ("architecture", "Architecture"),
        ("auto_regulations", "Traffic Regulations"),
        ("banking", "Banking"),
        ("beginning_authors", "Debut Fiction"),
        ("child_adv", "Children's Adventure"),
        ("child_det", "Children's Mystery"),
        ("child_education", "Children's Education"),
        ("child_prose", "Children's Prose"),
        ("child_sf", "Children's Science Fiction"),
        ("child_tale", "Fairy Tales"),
        ("child_verse", "Children's Verse"),
        ("children", "Children's Literature"),
        ("cine", "Cinema"),
        ("city_fantasy", "Urban Fantasy"),
        ("comedy", "Comedy"),
        ("comp_db", "Databases"),
        ("comp_hard", "Computer Hardware"),
        ("comp_osnet", "Operating Systems and Networks"),
        ("comp_programming", "Programming"),
        ("comp_soft", "Software"),
        ("comp_www", "Internet"),
        ("computers", "Computers"),
        ("design", "Art and Design"),
        ("det_action", "Action"),
        ("det_classic", "Classic Mystery"),
        ("det_crime", "Crime Fiction"),
        ("det_espionage", "Spy Fiction"),
        ("det_hard", "Hard-Boiled Mystery"),
        ("det_history", "Historical Mystery"),
        ("det_irony", "Ironic Mystery"),
        ("det_maniac", "Serial-Killer Mystery"),
        ("det_police", "Police Procedural"),
        ("det_political", "Political Mystery"),
        ("detective", "Mystery"),
        ("dissident", "Dissident Literature"),
        ("drama", "Drama"),
        ("dramaturgy", "Dramaturgy"),
        ("economics", "Economics"),
        ("epistolary_fiction", "Epistolary Fiction"),
        ("essay", "Essay"),
        ("fantasy", "Fantasy"),
        ("fantasy_fight", "Heroic Fantasy"),
        ("foreign_action", "Foreign Action"),
        ("foreign_adventure", "Foreign Adventure"),
        ("foreign_antique", "Foreign Antique Literature"),
        ("foreign_children", "Foreign Children's Literature"),
        ("foreign_contemporary", "Foreign Contemporary Fiction"),
        ("foreign_detective", "Foreign Mystery"),
        ("foreign_fantasy", "Foreign Fantasy"),
        ("foreign_poetry", "Foreign Poetry"),
        ("foreign_prose", "Foreign Prose"),
        ("foreign_sf", "Foreign Science Fiction"),
        ("geo_guides", "Travel Guides"),
        ("geography_book", "Geography"),
        ("gothic_novel", "Gothic Fiction"),
        ("great_story", "Novella"),
        ("home", "Home and Family"),
        ("home_cooking", "Cooking"),
        ("home_crafts", "Hobbies and Crafts"),
        ("home_diy", "Do It Yourself"),
        ("home_entertain", "Entertainment"),
        ("home_garden", "Gardening"),
        ("home_health", "Health"),
        ("home_pets", "Pets"),
        ("home_sex", "Erotica and Sexuality"),
        ("home_sport", "Sport"),
        ("humor", "Humor"),
        ("humor_anecdote", "Anecdotes"),
        ("humor_prose", "Humorous Prose"),
        ("humor_verse", "Humorous Verse"),
        ("literature_18", "18th-Century Literature"),
        ("literature_19", "19th-Century Literature"),
        ("literature_20", "20th-Century Literature"),
        ("love_contemporary", "Contemporary Romance"),
        ("love_detective", "Romantic Suspense"),
        ("love_erotica", "Erotic Romance"),
        ("love_history", "Historical Romance"),
        ("love_sf", "Romantic Fantasy"),
        ("love_short", "Short Romance"),
        ("military_history", "Military History"),
        ("military_special", "Military"),
        ("music_dancing", "Music and Dance"),
        ("narrative", "Narrative"),
        ("network_literature", "Online Fiction"),
        ("nonf_biography", "Biography and Memoirs"),
        ("nonf_criticism", "Criticism"),
        ("nonf_publicism", "Essays and Journalism"),
        ("nonfiction", "Nonfiction"),
        ("notes", "Sheet Music"),
        ("org_behavior", "Business and Management"),
        ("periodic", "Periodicals"),
        ("poetry", "Poetry"),
        ("popadanec", "Portal Fantasy"),
        ("prose_classic", "Classic Prose"),
        ("prose_contemporary", "Contemporary Prose"),
        ("prose_counter", "Counterculture"),
        ("prose_history", "Historical Prose"),
        ("prose_military", "War Fiction"),
        ("prose_rus_classic", "Russian Classics"),
        ("prose_su_classics", "Soviet Classics"),
        ("psy_alassic", "Psychology"),
        ("psy_childs", "Child Psychology"),
        ("psy_generic", "Psychology"),
        ("psy_personal", "Self-Improvement"),
        ("psy_sex_and_family", "Family Psychology"),
        ("psy_social", "Social Psychology"),
        ("psy_theraphy", "Psychotherapy"),
        ("ref_dict", "Dictionaries"),
        ("ref_encyc", "Encyclopedias"),
        ("ref_guide", "Guides"),
        ("ref_ref", "Reference"),
        ("reference", "Reference Literature"),
        ("religion", "Religion"),
        ("religion_esoterics", "Esoterics"),
        ("religion_rel", "Religious Literature"),
        ("religion_self", "Spiritual Self-Improvement"),
        ("sci_biology", "Biology"),
        ("sci_chem", "Chemistry"),
        ("sci_culture", "Cultural Studies"),
        ("sci_history", "History"),
        ("sci_juris", "Law"),
        ("sci_linguistic", "Linguistics"),
        ("sci_math", "Mathematics"),
        ("sci_medicine", "Medicine"),
        ("sci_philosophy", "Philosophy"),
        ("sci_phys", "Physics"),
        ("sci_politics", "Political Science"),
        ("sci_psychology", "Psychology"),
        ("sci_religion", "Religious Studies"),
        ("sci_tech", "Technology"),
        ("science", "Science"),
        ("sf", "Science Fiction"),
        ("sf_action", "Action Science Fiction"),
        ("sf_cyberpunk", "Cyberpunk"),
        ("sf_detective", "Science Fiction Mystery"),
        ("sf_epic", "Epic Fantasy"),
        ("sf_etc", "Speculative Fiction"),
        ("sf_fantasy", "Fantasy"),
        ("sf_heroic", "Heroic Science Fiction"),
        ("sf_history", "Alternate History"),
        ("sf_horror", "Horror"),
        ("sf_humor", "Humorous Science Fiction"),
        ("sf_litrpg", "LitRPG"),
        ("sf_mystic", "Mystic Fiction"),
        ("sf_postapocalyptic", "Post-Apocalyptic"),
        ("sf_social", "Social Science Fiction"),
        ("sf_space", "Space Science Fiction"),
        ("sf_stimpank", "Steampunk"),
        ("short_story", "Short Stories"),
        ("small_business", "Small Business"),
        ("stock", "Investing"),
        ("thriller", "Thriller"),
        ("tragedy", "Tragedy"),
        ("travel_notes", "Travel Notes"),
        ("vaudeville", "Vaudeville"),
    ])
});

/// Human-readable label for an FB2 genre code.
///
/// Unmapped codes are returned title-cased with underscores as spaces, so
/// `"weird_genre"` becomes `"Weird Genre"`.
pub fn label(code: &str) -> String {
    let code = code.trim();
    match GENRES.get(code) {
        Some(label) => (*label).to_owned(),
        None => title_case(code),
    }
}

fn title_case(code: &str) -> String {
    code.split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sf", "Science Fiction")]
    #[case("det_classic", "Classic Mystery")]
    #[case(" sf ", "Science Fiction")]
    #[case("weird_genre", "Weird Genre")]
    #[case("unmapped", "Unmapped")]
    fn labels(#[case] code: &str, #[case] expected: &str) {
        assert_eq!(label(code), expected);
    }
}
