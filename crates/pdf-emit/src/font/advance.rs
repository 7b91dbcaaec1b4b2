//! Glyph advance compression for `/W` and `/Widths` arrays
//!
//! A single left-to-right scan splits the advances into explicit ranges and
//! constant runs. Glyphs outside the requested subset are "don't care" and
//! may resolve to any width.

use crate::object::Array;

/// Advance of a glyph past the end of the scan
pub const INVALID_ADVANCE: i16 = i16::MIN;
/// Advance of a glyph that is not part of the requested subset
pub const DONT_CARE_ADVANCE: i16 = i16::MIN + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// One advance for the whole font
    Default,
    /// One advance per glyph in `[start_id, end_id]`
    Range,
    /// One advance shared by every glyph in `[start_id, end_id]`
    Run,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceMetric {
    pub kind: MetricType,
    pub start_id: u16,
    pub end_id: u16,
    pub advance: Vec<i16>,
}

impl AdvanceMetric {
    /// Advance of `glyph` if this entry covers it
    pub fn advance_for(&self, glyph: u16) -> Option<i16> {
        match self.kind {
            MetricType::Default => self.advance.first().copied(),
            MetricType::Run if (self.start_id..=self.end_id).contains(&glyph) => {
                self.advance.first().copied()
            }
            MetricType::Range if (self.start_id..=self.end_id).contains(&glyph) => self
                .advance
                .get((glyph - self.start_id) as usize)
                .copied(),
            _ => None,
        }
    }
}

/// Look up the advance of `glyph` in a compressed sequence
pub fn advance_for(metrics: &[AdvanceMetric], glyph: u16) -> Option<i16> {
    metrics
        .iter()
        .filter(|m| m.kind != MetricType::Default)
        .find_map(|m| m.advance_for(glyph))
        .or_else(|| {
            metrics
                .iter()
                .find(|m| m.kind == MetricType::Default)
                .and_then(|m| m.advance.first().copied())
        })
}

/// Range under construction
struct OpenRange {
    start: i32,
    advance: Vec<i16>,
}

impl OpenRange {
    fn new(start: i32) -> Self {
        Self {
            start,
            advance: Vec::new(),
        }
    }

    /// Close the range at `end`, trimming advances that carry no information
    fn finish(self, end: i32, kind: MetricType) -> AdvanceMetric {
        let OpenRange { start, mut advance } = self;
        debug_assert!(end >= start);
        let mut end = end.max(start);
        let mut kind = kind;

        let expected = (end - start + 1) as usize;
        if advance.len() >= expected {
            if let Some(i) = advance[..expected]
                .iter()
                .rposition(|&a| a != DONT_CARE_ADVANCE && a != INVALID_ADVANCE && a != 0)
            {
                end = start + i as i32;
            }
        }

        let new_len = match kind {
            MetricType::Range => (end - start + 1) as usize,
            _ => {
                if end == start {
                    kind = MetricType::Range;
                }
                1
            }
        };
        advance.truncate(new_len);
        if kind == MetricType::Range {
            for a in advance.iter_mut() {
                if *a == DONT_CARE_ADVANCE {
                    *a = 0;
                }
            }
        }

        AdvanceMetric {
            kind,
            start_id: start as u16,
            end_id: end as u16,
            advance,
        }
    }
}

/// Compress per-glyph advances into ranges and runs
///
/// With a `subset` (sorted, ascending) only those glyphs are measured and
/// everything between them is "don't care". Without one every glyph in
/// `0..num_glyphs` is measured. An empty result means the font carries no
/// useful width information.
pub fn glyph_widths(
    num_glyphs: u16,
    subset: Option<&[u16]>,
    mut advance_of: impl FnMut(u16) -> i16,
) -> Vec<AdvanceMetric> {
    let subset = subset.filter(|glyphs| !glyphs.is_empty());
    debug_assert!(subset.map_or(true, |s| s.windows(2).all(|w| w[0] < w[1])));

    // Cut-offs, assuming an advance costs about 8 characters and a glyph id
    // about 3:
    //  a. dropping 4 zeros or don't-cares pays for restarting a range
    //  b. 3 repeated advances pay for a range break plus a run
    //  c. so do 2 repeated advances followed by 3 don't-cares
    //  d. leading zeros and don't-cares are always worth dropping
    //  e. outside a range, 2 repeated advances already pay for a run
    let (first_index, last_index) = match subset {
        Some(glyphs) => (glyphs[0] as i32, glyphs[glyphs.len() - 1] as i32 + 1),
        None => (0, num_glyphs as i32),
    };

    let mut result = Vec::new();
    let mut pushed_any = false;
    let mut last_advance = INVALID_ADVANCE;
    let mut repeated_advances = 0i32;
    let mut wild_cards_in_run = 0i32;
    let mut trailing_wild_cards = 0i32;
    let mut subset_index = 0usize;
    let mut current = OpenRange::new(first_index);

    for gid in first_index..=last_index {
        let mut advance = INVALID_ADVANCE;
        if gid < last_index {
            match subset {
                None => advance = advance_of(gid as u16),
                Some(glyphs) if subset_index < glyphs.len() && glyphs[subset_index] as i32 == gid => {
                    advance = advance_of(gid as u16);
                    subset_index += 1;
                }
                Some(_) => advance = DONT_CARE_ADVANCE,
            }
        }

        if advance == last_advance {
            repeated_advances += 1;
            trailing_wild_cards = 0;
        } else if advance == DONT_CARE_ADVANCE {
            wild_cards_in_run += 1;
            trailing_wild_cards += 1;
        } else if current.advance.len() as i32 == repeated_advances + 1 + wild_cards_in_run {
            // Everything since the range opened belongs to one run.
            if last_advance == 0 {
                current = OpenRange::new(gid);
                trailing_wild_cards = 0;
            } else if repeated_advances + 1 >= 2 || trailing_wild_cards >= 4 {
                let finished = std::mem::replace(&mut current, OpenRange::new(gid));
                result.push(finished.finish(gid - 1, MetricType::Run));
                pushed_any = true;
                trailing_wild_cards = 0;
            }
            repeated_advances = 0;
            wild_cards_in_run = trailing_wild_cards;
            trailing_wild_cards = 0;
        } else {
            if last_advance == 0 && repeated_advances + 1 + wild_cards_in_run >= 4 {
                let finished = std::mem::replace(&mut current, OpenRange::new(gid));
                result.push(finished.finish(
                    gid - repeated_advances - wild_cards_in_run - 2,
                    MetricType::Range,
                ));
                pushed_any = true;
                trailing_wild_cards = 0;
            } else if trailing_wild_cards >= 4 && repeated_advances + 1 < 2 {
                let finished = std::mem::replace(&mut current, OpenRange::new(gid));
                result.push(finished.finish(gid - trailing_wild_cards - 1, MetricType::Range));
                pushed_any = true;
                trailing_wild_cards = 0;
            } else if last_advance != 0
                && (repeated_advances + 1 >= 3
                    || (repeated_advances + 1 >= 2 && wild_cards_in_run >= 3))
            {
                let run_start = gid - repeated_advances - wild_cards_in_run - 1;
                let finished = std::mem::replace(&mut current, OpenRange::new(gid));
                result.push(finished.finish(run_start - 1, MetricType::Range));

                let mut run = OpenRange::new(run_start);
                run.advance.push(last_advance);
                result.push(run.finish(gid - 1, MetricType::Run));
                pushed_any = true;
                trailing_wild_cards = 0;
            }
            repeated_advances = 0;
            wild_cards_in_run = trailing_wild_cards;
            trailing_wild_cards = 0;
        }

        current.advance.push(advance);
        if advance != DONT_CARE_ADVANCE {
            last_advance = advance;
        }
    }

    if current.start == last_index {
        if !pushed_any {
            result.clear();
        }
    } else {
        result.push(current.finish(last_index - 1, MetricType::Range));
    }
    result
}

/// Convert a value in font design units to the 1000-unit glyph space
pub fn scale_from_font_units(value: i16, em_size: u16) -> f32 {
    if em_size == 1000 || em_size == 0 {
        return value as f32;
    }
    value as f32 * 1000.0 / em_size as f32
}

/// Build a CID font `/W` array; also returns the default width, if any
pub fn compose_advance_data(metrics: &[AdvanceMetric], em_size: u16) -> (Array, i16) {
    let mut result = Array::new();
    let mut default_advance = 0;
    for metric in metrics {
        match metric.kind {
            MetricType::Default => {
                default_advance = metric.advance.first().copied().unwrap_or(0);
            }
            MetricType::Range => {
                let mut advances = Array::with_capacity(metric.advance.len());
                for &a in &metric.advance {
                    advances.append_scalar(scale_from_font_units(a, em_size));
                }
                result.append_int(metric.start_id as i32);
                result.append_object(advances);
            }
            MetricType::Run => {
                result.append_int(metric.start_id as i32);
                result.append_int(metric.end_id as i32);
                result.append_scalar(scale_from_font_units(metric.advance[0], em_size));
            }
        }
    }
    (result, default_advance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn widths(advances: &[i16], subset: Option<&[u16]>) -> Vec<AdvanceMetric> {
        glyph_widths(advances.len() as u16, subset, |g| advances[g as usize])
    }

    fn run(start: u16, end: u16, advance: i16) -> AdvanceMetric {
        AdvanceMetric {
            kind: MetricType::Run,
            start_id: start,
            end_id: end,
            advance: vec![advance],
        }
    }

    fn range(start: u16, advance: &[i16]) -> AdvanceMetric {
        AdvanceMetric {
            kind: MetricType::Range,
            start_id: start,
            end_id: start + advance.len() as u16 - 1,
            advance: advance.to_vec(),
        }
    }

    /// Every measured glyph must expand back to its original advance.
    fn assert_round_trip(advances: &[i16], subset: Option<&[u16]>) {
        let metrics = widths(advances, subset);
        let measured: Vec<u16> = match subset {
            Some(glyphs) => glyphs.to_vec(),
            None => (0..advances.len() as u16).collect(),
        };
        for glyph in measured {
            let expected = advances[glyph as usize];
            let actual = advance_for(&metrics, glyph).unwrap_or(0);
            assert_eq!(
                actual, expected,
                "glyph {glyph} of {advances:?} (subset {subset:?}) -> {metrics:?}"
            );
        }
        for pair in metrics.windows(2) {
            assert!(pair[0].end_id < pair[1].start_id, "overlap in {metrics:?}");
        }
    }

    #[test]
    fn test_empty_font() {
        assert!(widths(&[], None).is_empty());
    }

    #[test]
    fn test_single_glyph() {
        assert_eq!(widths(&[500], None), vec![range(0, &[500])]);
    }

    #[test]
    fn test_all_equal_becomes_run() {
        assert_eq!(widths(&[600; 10], None), vec![run(0, 9, 600)]);
    }

    #[test]
    fn test_all_distinct_is_one_range() {
        assert_eq!(
            widths(&[100, 200, 300], None),
            vec![range(0, &[100, 200, 300])]
        );
    }

    #[test]
    fn test_all_zero_has_no_widths() {
        assert!(widths(&[0; 6], None).is_empty());
    }

    #[test]
    fn test_leading_zeros_are_dropped() {
        assert_eq!(
            widths(&[0, 0, 0, 0, 0, 300, 400], None),
            vec![range(5, &[300, 400])]
        );
    }

    #[test]
    fn test_repeats_inside_range_split_into_run() {
        assert_eq!(
            widths(&[100, 200, 500, 500, 500, 500, 300], None),
            vec![range(0, &[100, 200]), run(2, 5, 500), range(6, &[300])]
        );
    }

    #[test]
    fn test_trailing_zeros_are_stripped() {
        assert_eq!(
            widths(&[100, 200, 0, 0], None),
            vec![range(0, &[100, 200])]
        );
    }

    #[test]
    fn test_subset_with_gaps() {
        let advances = [0, 100, 999, 999, 999, 999, 999, 999, 200, 300];
        let subset = [0u16, 1, 8, 9];
        assert_round_trip(&advances, Some(&subset));
        let metrics = widths(&advances, Some(&subset));
        assert!(metrics
            .iter()
            .all(|m| m.advance.iter().all(|&a| a != 999)));
    }

    #[test]
    fn test_round_trip_synthetic_arrays() {
        let mut state = 0x2545_F491_u32;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };

        for case in 0..400 {
            let len = (next() % 300) as usize;
            let palette = 1 + next() % 6;
            let advances: Vec<i16> = (0..len)
                .map(|_| match next() % 10 {
                    0 => 0,
                    _ => (100 * (next() % palette)) as i16,
                })
                .collect();
            assert_round_trip(&advances, None);

            if len > 0 {
                let density = 1 + next() % 8;
                let mut subset: Vec<u16> = (0..len as u16)
                    .filter(|_| next() % 8 < density)
                    .collect();
                if case % 5 == 0 {
                    // long stretches of unused glyphs
                    subset.retain(|g| g % 50 < 3);
                }
                if !subset.is_empty() {
                    assert_round_trip(&advances, Some(&subset));
                }
            }
        }
    }

    #[test]
    fn test_compose_advance_data() {
        let metrics = vec![range(1, &[1000, 2048]), run(5, 9, 512)];
        let (array, default_width) = compose_advance_data(&metrics, 2048);
        assert_eq!(default_width, 0);
        assert_eq!(array.len(), 5);
        assert_eq!(array.get(0).and_then(|o| o.as_int()), Some(1));
        let inner = array.get(1).and_then(|o| o.as_array()).unwrap();
        assert_eq!(inner.len(), 2);
        assert_eq!(array.get(2).and_then(|o| o.as_int()), Some(5));
        assert_eq!(array.get(3).and_then(|o| o.as_int()), Some(9));
    }

    #[test]
    fn test_scale_from_font_units() {
        assert_eq!(scale_from_font_units(500, 1000), 500.0);
        assert_eq!(scale_from_font_units(1024, 2048), 500.0);
        assert_eq!(scale_from_font_units(-256, 2048), -125.0);
    }
}
