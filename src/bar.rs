/// Fixed-width progress bar: '=' for completed splits, '>' for running,
/// spaces for pending. The three segments always fill the width exactly.
pub fn format_progress_bar(width: usize, complete: u64, running: u64, total: u64) -> String {
    if total == 0 {
        // Not-yet-started query: an all-blank bar, not a crash.
        return " ".repeat(width);
    }

    let pending = total.saturating_sub(complete + running);

    // Nominal lengths are ceiling-proportional, capped at the full width.
    let mut complete_len = proportion(complete, width, total);
    let mut pending_len = proportion(pending, width, total);

    // Leave room for at least one ">" as long as anything is running.
    let min_running = usize::from(running > 0);
    let mut running_len = proportion(running, width, total).max(min_running);

    // Ceiling rounding can overshoot; reconcile by shrinking pending first,
    // then running (never below its floor), then complete.
    if complete_len + running_len + pending_len != width && pending > 0 {
        pending_len = width.saturating_sub(complete_len + running_len);
    }
    if complete_len + running_len + pending_len != width {
        running_len = width
            .saturating_sub(complete_len + pending_len)
            .max(min_running);
    }
    if complete_len + running_len + pending_len != width {
        complete_len = width.saturating_sub(running_len + pending_len);
    }

    assert_eq!(
        complete_len + running_len + pending_len,
        width,
        "progress bar segments must fill the width: complete={complete} running={running} total={total}",
    );

    let mut bar = String::with_capacity(width);
    bar.extend(std::iter::repeat('=').take(complete_len));
    bar.extend(std::iter::repeat('>').take(running_len));
    bar.extend(std::iter::repeat(' ').take(pending_len));
    bar
}

/// Ceiling of part * width / total, capped at width.
fn proportion(part: u64, width: usize, total: u64) -> usize {
    let scaled = part * width as u64;
    let length = (scaled + total - 1) / total;
    (length as usize).min(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_renders_all_blank() {
        assert_eq!(format_progress_bar(8, 0, 0, 0), "        ");
    }

    #[test]
    fn exact_proportions_need_no_reconciliation() {
        assert_eq!(format_progress_bar(10, 5, 2, 10), "=====>>   ");
        assert_eq!(format_progress_bar(4, 4, 0, 4), "====");
        assert_eq!(format_progress_bar(4, 0, 0, 4), "    ");
    }

    #[test]
    fn running_always_gets_at_least_one_marker() {
        // 1 running split out of a million rounds to zero width nominally.
        let bar = format_progress_bar(42, 0, 1, 1_000_000);
        assert!(bar.contains('>'));
        assert_eq!(bar.len(), 42);

        let bar = format_progress_bar(42, 999_999, 1, 1_000_000);
        assert!(bar.contains('>'));
        assert_eq!(bar.len(), 42);
    }

    #[test]
    fn rounding_overshoot_is_reconciled() {
        // ceil allocation of 3+3+5 overshoots a width of 10.
        let bar = format_progress_bar(10, 2, 2, 7);
        assert_eq!(bar.len(), 10);
        assert_eq!(bar.matches('=').count(), 3);
        assert_eq!(bar.matches('>').count(), 3);
    }

    #[test]
    fn segments_always_sum_to_width() {
        for width in 1..=48 {
            for total in [1u64, 2, 3, 7, 10, 97, 1000] {
                for complete in [0, total / 3, total / 2, total] {
                    for running in [0, 1, total / 4, total.saturating_sub(complete)] {
                        let bar = format_progress_bar(width, complete, running, total);
                        assert_eq!(bar.len(), width, "complete={complete} running={running} total={total}");
                        if running > 0 {
                            assert!(bar.contains('>'));
                        }
                    }
                }
            }
        }
    }
}
