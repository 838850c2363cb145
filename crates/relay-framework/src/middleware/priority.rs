/// Reorders `items` so that entries named in `priority` appear in that
/// relative order.
///
/// Entries missing from `priority` keep their relative order. Whenever a
/// prioritised entry is found after one that should follow it, it is moved
/// to just before that entry and the scan restarts.
pub fn sort_by_priority<T, F>(mut items: Vec<T>, priority: &[String], name: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let rank = |item: &T| priority.iter().position(|p| p == name(item));

    'scan: loop {
        let mut last: Option<(usize, usize)> = None;
        for index in 0..items.len() {
            let Some(rank) = rank(&items[index]) else {
                continue;
            };
            if let Some((last_index, last_rank)) = last
                && rank < last_rank
            {
                let item = items.remove(index);
                items.insert(last_index, item);
                continue 'scan;
            }
            last = Some((index, rank));
        }
        return items;
    }
}
