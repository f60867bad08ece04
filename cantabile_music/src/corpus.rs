// Embedded training themes for the built-in probability models.
//
// Short public-domain themes written as (scale degree, duration in ticks)
// pairs, relative to each piece's own tonic. They are enough to give the
// built-in models a recognizable accent without shipping trained tables.
// Larger models trained offline load through `ModelLibrary::load`.

use crate::config::Composer;
use crate::meter::Ticks;

const E: Ticks = 4;
const Q: Ticks = 8;
const DQ: Ticks = 12;
const H: Ticks = 16;
const DH: Ticks = 24;

/// One melody from the corpus.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub title: &'static str,
    pub composer: Composer,
    pub notes: &'static [(u8, Ticks)],
}

#[rustfmt::skip]
pub const THEMES: &[Theme] = &[
    Theme {
        title: "Minuet in G",
        composer: Composer::Bach,
        notes: &[
            (5, Q), (1, E), (2, E), (3, E), (4, E),
            (5, Q), (1, Q), (1, Q),
            (6, Q), (4, E), (5, E), (6, E), (7, E),
            (1, Q), (1, Q), (1, Q),
            (4, Q), (5, E), (4, E), (3, E), (2, E),
            (3, Q), (4, E), (3, E), (2, E), (1, E),
            (7, Q), (1, E), (2, E), (3, E), (1, E),
            (2, DH),
            (5, Q), (1, E), (2, E), (3, E), (4, E),
            (5, Q), (1, Q), (1, Q),
            (6, Q), (4, E), (5, E), (6, E), (7, E),
            (1, Q), (1, Q), (1, Q),
            (4, Q), (5, E), (4, E), (3, E), (2, E),
            (3, Q), (4, E), (3, E), (2, E), (1, E),
            (2, Q), (3, E), (2, E), (1, E), (7, E),
            (1, DH),
        ],
    },
    Theme {
        title: "Variations on \"Ah vous dirai-je, Maman\", K. 265",
        composer: Composer::Mozart,
        notes: &[
            (1, Q), (1, Q), (5, Q), (5, Q), (6, Q), (6, Q), (5, H),
            (4, Q), (4, Q), (3, Q), (3, Q), (2, Q), (2, Q), (1, H),
            (5, Q), (5, Q), (4, Q), (4, Q), (3, Q), (3, Q), (2, H),
            (5, Q), (5, Q), (4, Q), (4, Q), (3, Q), (3, Q), (2, H),
            (1, Q), (1, Q), (5, Q), (5, Q), (6, Q), (6, Q), (5, H),
            (4, Q), (4, Q), (3, Q), (3, Q), (2, Q), (2, Q), (1, H),
        ],
    },
    Theme {
        title: "Eine kleine Nachtmusik, K. 525",
        composer: Composer::Mozart,
        notes: &[
            (1, Q), (5, E), (1, Q), (5, E),
            (1, E), (5, E), (1, E), (3, E), (5, H),
            (4, Q), (2, E), (4, Q), (2, E),
            (4, E), (2, E), (7, E), (2, E), (5, H),
        ],
    },
    Theme {
        title: "Symphony No. 9, \"Ode to Joy\"",
        composer: Composer::Beethoven,
        notes: &[
            (3, Q), (3, Q), (4, Q), (5, Q),
            (5, Q), (4, Q), (3, Q), (2, Q),
            (1, Q), (1, Q), (2, Q), (3, Q),
            (3, DQ), (2, E), (2, H),
            (3, Q), (3, Q), (4, Q), (5, Q),
            (5, Q), (4, Q), (3, Q), (2, Q),
            (1, Q), (1, Q), (2, Q), (3, Q),
            (2, DQ), (1, E), (1, H),
            (2, Q), (2, Q), (3, Q), (1, Q),
            (2, Q), (3, E), (4, E), (3, Q), (1, Q),
            (2, Q), (3, E), (4, E), (3, Q), (2, Q),
            (1, Q), (2, Q), (5, H),
        ],
    },
    Theme {
        title: "Symphony No. 5, opening motto",
        composer: Composer::Beethoven,
        notes: &[
            (5, E), (5, E), (5, E), (3, DH),
            (4, E), (4, E), (4, E), (2, DH),
        ],
    },
];

/// Themes that train a composer's model. `Combined` takes all of them.
pub fn themes_for(composer: Composer) -> Vec<&'static Theme> {
    THEMES
        .iter()
        .filter(|t| composer == Composer::Combined || t.composer == composer)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_composer_has_material() {
        for composer in Composer::ALL {
            assert!(!themes_for(composer).is_empty(), "{composer} has no themes");
        }
        assert_eq!(themes_for(Composer::Combined).len(), THEMES.len());
    }

    #[test]
    fn test_degrees_are_in_range() {
        for theme in THEMES {
            for &(degree, ticks) in theme.notes {
                assert!((1..=7).contains(&degree), "{}: degree {degree}", theme.title);
                assert!(ticks > 0, "{}: empty duration", theme.title);
            }
        }
    }
}
