use horizon_macros::value_object;

#[value_object]
struct Amount {
    value: i64,
}

#[value_object(debug = false)]
struct NonDebugVO(i32);

#[value_object(ord = true)]
struct Sequence(u64);

#[value_object]
enum Level {
    #[default]
    Low,
    High,
}

fn main() {
    let _ = format!("{:?}", Amount { value: 0 });

    let a = Amount::default();
    let _b = a.clone();
    let _eq = a == Amount { value: 0 };

    let _ = NonDebugVO(1);

    // ord = true：可复制、可排序
    let s = Sequence(1);
    let t = s;
    assert!(Sequence(2) > t);
    assert_eq!(s, t);

    let _lv: Level = Default::default();
    let _hi = Level::High;
}
