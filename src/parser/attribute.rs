use crate::record::ChapterBoundary;

/// Last boundary starting at or before `offset`. `boundaries` must be
/// sorted by offset, as `chapters::segment` returns them.
pub fn boundary_for(offset: usize, boundaries: &[ChapterBoundary]) -> Option<&ChapterBoundary> {
    let idx = boundaries.partition_point(|b| b.offset <= offset);
    idx.checked_sub(1).map(|i| &boundaries[i])
}

/// Chapter label for a question at `offset`, or `""` before the first heading.
pub fn attribute(offset: usize, boundaries: &[ChapterBoundary]) -> &str {
    boundary_for(offset, boundaries).map_or("", |b| b.label.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Vec<ChapterBoundary> {
        [(10, 1, "第1章 绪论"), (50, 2, "第2章 线性表"), (90, 3, "第3章 栈")]
            .into_iter()
            .map(|(offset, number, label)| ChapterBoundary {
                offset,
                number,
                label: label.to_string(),
            })
            .collect()
    }

    #[test]
    fn before_first_boundary() {
        assert_eq!(attribute(0, &bounds()), "");
        assert_eq!(attribute(9, &bounds()), "");
    }

    #[test]
    fn at_and_after_boundaries() {
        let b = bounds();
        assert_eq!(attribute(10, &b), "第1章 绪论");
        assert_eq!(attribute(49, &b), "第1章 绪论");
        assert_eq!(attribute(50, &b), "第2章 线性表");
        assert_eq!(attribute(10_000, &b), "第3章 栈");
    }

    #[test]
    fn empty_boundary_list() {
        assert_eq!(attribute(42, &[]), "");
        assert!(boundary_for(42, &[]).is_none());
    }

    #[test]
    fn monotonic_and_repeatable() {
        let b = bounds();
        let mut last = 0;
        for offset in 0..200 {
            let at = boundary_for(offset, &b).map_or(0, |x| x.offset);
            assert!(at >= last);
            assert!(at <= offset);
            assert_eq!(attribute(offset, &b), attribute(offset, &b));
            last = at;
        }
    }
}
