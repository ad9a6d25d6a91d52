//! Picking one history item to display.

use rand::Rng;

/// Which history item a request asks for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OffsetSpec {
    #[default]
    Absent,
    Random,
    Index(u64),
    /// Anything else; selected like [`OffsetSpec::Random`].
    Other(String),
}

impl OffsetSpec {
    /// Interpret a raw request value.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return OffsetSpec::Absent;
        };
        if raw.eq_ignore_ascii_case("random") {
            return OffsetSpec::Random;
        }
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = raw.parse::<u64>() {
                return OffsetSpec::Index(index);
            }
        }
        OffsetSpec::Other(raw.to_string())
    }
}

impl From<u64> for OffsetSpec {
    fn from(index: u64) -> Self {
        OffsetSpec::Index(index)
    }
}

impl From<Option<&str>> for OffsetSpec {
    fn from(raw: Option<&str>) -> Self {
        OffsetSpec::parse(raw)
    }
}

/// Index into a list of `len` items. `None` only when `len` is 0.
///
/// A numeric offset cycles through the list as `offset mod len`; every other
/// offset picks uniformly at random.
pub fn select_index<R: Rng>(len: usize, offset: &OffsetSpec, rng: &mut R) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let index = match offset {
        OffsetSpec::Index(i) => (*i % len as u64) as usize,
        OffsetSpec::Absent | OffsetSpec::Random | OffsetSpec::Other(_) => rng.gen_range(0..len),
    };
    Some(index)
}

pub fn select<'a, T>(items: &'a [T], offset: &OffsetSpec) -> Option<&'a T> {
    select_with(items, offset, &mut rand::thread_rng())
}

pub fn select_with<'a, T, R: Rng>(items: &'a [T], offset: &OffsetSpec, rng: &mut R) -> Option<&'a T> {
    select_index(items.len(), offset, rng).map(|i| &items[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parse_offsets() {
        assert_eq!(OffsetSpec::parse(None), OffsetSpec::Absent);
        assert_eq!(OffsetSpec::parse(Some("random")), OffsetSpec::Random);
        assert_eq!(OffsetSpec::parse(Some("RaNdOm")), OffsetSpec::Random);
        assert_eq!(OffsetSpec::parse(Some("7")), OffsetSpec::Index(7));
        assert_eq!(OffsetSpec::parse(Some("007")), OffsetSpec::Index(7));
        assert_eq!(OffsetSpec::parse(Some("-1")), OffsetSpec::Other("-1".to_string()));
        assert_eq!(OffsetSpec::parse(Some("")), OffsetSpec::Other(String::new()));
        assert_eq!(OffsetSpec::parse(Some("1.5")), OffsetSpec::Other("1.5".to_string()));
    }

    #[test]
    fn test_overflowing_digits_fall_back_to_random() {
        let huge = "99999999999999999999999999";
        assert_eq!(OffsetSpec::parse(Some(huge)), OffsetSpec::Other(huge.to_string()));

        let items = [1, 2, 3];
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_with(&items, &OffsetSpec::parse(Some(huge)), &mut rng).is_some());
    }

    #[test]
    fn test_numeric_offset_cycles_modulo_len() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 1..=6u64 {
            let items: Vec<u64> = (0..n).collect();
            for offset in [0, n - 1, n, n + 1, 2 * n] {
                let picked = select_with(&items, &OffsetSpec::Index(offset), &mut rng);
                assert_eq!(picked, Some(&items[(offset % n) as usize]), "n={n} offset={offset}");
            }
        }
    }

    #[test]
    fn test_random_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let items = ["a", "b", "c", "d", "e"];
        for spec in [
            OffsetSpec::Absent,
            OffsetSpec::Random,
            OffsetSpec::Other("latest".to_string()),
        ] {
            for _ in 0..200 {
                let picked = select_with(&items, &spec, &mut rng).unwrap();
                assert!(items.contains(picked));
            }
        }
    }

    #[test]
    fn test_random_reaches_every_item() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = [false; 4];
        for _ in 0..400 {
            seen[select_index(4, &OffsetSpec::Random, &mut rng).unwrap()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_empty_items_select_nothing() {
        let items: [u8; 0] = [];
        assert_eq!(select(&items, &OffsetSpec::Index(3)), None);
    }
}
