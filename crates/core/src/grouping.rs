use chrono::NaiveDate;

use crate::extraction::ExtractedLineItem;

/// The unit of independent processing within one intake event: every group
/// becomes its own proposal-creation attempt, and a failure in one group
/// never aborts its siblings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateGroup {
    pub date: Option<NaiveDate>,
    pub lines: Vec<ExtractedLineItem>,
    pub cancel_only: bool,
}

/// Partition extracted lines by `line.delivery_date ?? default_date`,
/// preserving first-appearance order, then append an empty cancel-only
/// group for each explicit cancel date not already covered.
///
/// A message with no extractable lines still yields one (empty) group so
/// the pipeline always produces something reviewable.
pub fn group_by_delivery_date(
    lines: &[ExtractedLineItem],
    default_date: Option<NaiveDate>,
    cancel_dates: &[NaiveDate],
) -> Vec<DateGroup> {
    let mut groups: Vec<DateGroup> = Vec::new();

    for line in lines {
        let date = line.delivery_date.or(default_date);
        match groups.iter_mut().find(|group| group.date == date && !group.cancel_only) {
            Some(group) => group.lines.push(line.clone()),
            None => {
                groups.push(DateGroup { date, lines: vec![line.clone()], cancel_only: false });
            }
        }
    }

    for cancel_date in cancel_dates {
        let covered = groups.iter().any(|group| group.date == Some(*cancel_date));
        if !covered {
            groups.push(DateGroup { date: Some(*cancel_date), lines: Vec::new(), cancel_only: true });
        }
    }

    if groups.is_empty() {
        groups.push(DateGroup { date: default_date, lines: Vec::new(), cancel_only: false });
    }

    groups
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::item::ItemId;
    use crate::extraction::ExtractedLineItem;

    use super::group_by_delivery_date;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).expect("valid date")
    }

    fn line(item: &str, delivery: Option<NaiveDate>) -> ExtractedLineItem {
        ExtractedLineItem {
            item_id: Some(ItemId(item.to_string())),
            variant_code: None,
            quantity: 1,
            delivery_date: delivery,
            remove: false,
            raw_text: None,
        }
    }

    #[test]
    fn one_message_spanning_two_dates_yields_two_groups() {
        let lines = vec![
            line("item-a", Some(date(3))),
            line("item-b", Some(date(6))),
            line("item-c", Some(date(3))),
        ];

        let groups = group_by_delivery_date(&lines, None, &[]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date, Some(date(3)));
        assert_eq!(groups[0].lines.len(), 2);
        assert_eq!(groups[1].date, Some(date(6)));
        assert_eq!(groups[1].lines.len(), 1);
        assert!(groups.iter().all(|group| !group.cancel_only));
    }

    #[test]
    fn dateless_lines_fall_back_to_the_default_date() {
        let lines = vec![line("item-a", None), line("item-b", Some(date(6)))];

        let groups = group_by_delivery_date(&lines, Some(date(3)), &[]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date, Some(date(3)));
        assert_eq!(groups[1].date, Some(date(6)));
    }

    #[test]
    fn lines_without_any_date_group_under_none() {
        let groups = group_by_delivery_date(&[line("item-a", None)], None, &[]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].date, None);
    }

    #[test]
    fn uncovered_cancel_dates_append_empty_cancel_only_groups() {
        let lines = vec![line("item-a", Some(date(3)))];

        let groups = group_by_delivery_date(&lines, None, &[date(3), date(6)]);

        assert_eq!(groups.len(), 2);
        assert!(!groups[0].cancel_only, "existing group keeps its lines");
        assert!(groups[1].cancel_only);
        assert_eq!(groups[1].date, Some(date(6)));
        assert!(groups[1].lines.is_empty());
    }

    #[test]
    fn empty_extraction_yields_one_reviewable_group() {
        let groups = group_by_delivery_date(&[], Some(date(3)), &[]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].date, Some(date(3)));
        assert!(groups[0].lines.is_empty());
        assert!(!groups[0].cancel_only);
    }
}
