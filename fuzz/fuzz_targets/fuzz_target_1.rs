#![no_main]
use libdivide_s64::BranchFreeDivider;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|items: Vec<i64>| {
    let d = match items.first() {
        Some(&d) => d,
        None => return,
    };
    let divider = match BranchFreeDivider::new(d) {
        Ok(divider) => divider,
        Err(_) => return,
    };
    assert_eq!(divider.recover(), d);

    let (magic, more) = divider.to_raw_parts();
    assert_eq!(BranchFreeDivider::from_raw_parts(magic, more), Ok(divider));

    for &item in items.iter() {
        assert_eq!(item / &divider, item.wrapping_div(d), "branchless {} / {}", item, d);
    }

    let expected: Vec<i64> = items.iter().map(|n| n.wrapping_div(d)).collect();
    assert_eq!(divider.divide_all(&items), expected);
});
