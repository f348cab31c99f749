use zweep::common::{HashFunction, Predicate};
use zweep::errors::ErrorKind;
use zweep::metrics::MetricsRegistry;
use zweep::sweep::{
    BagImplementor, DefaultSweepArea, HashImplementor, ListImplementor, MemoryManagedSweepArea,
    ObjectSize, SweepArea, SweepAreaProvider,
};

#[ctor::ctor]
fn init_logger() {
    colog::init();
}

fn match_value() -> Predicate<i32, i32> {
    Predicate::from_fn(|probe: &i32, e: &i32| probe == e)
}

fn below() -> Predicate<i32, i32> {
    Predicate::from_fn(|watermark: &i32, e: &i32| e < watermark)
}

fn list_area(self_reorganize: bool) -> SweepArea<i32, i32> {
    SweepArea::new(
        DefaultSweepArea::new(
            0,
            self_reorganize,
            vec![match_value(), match_value()],
            vec![below(), below()],
            Predicate::equality(),
            ListImplementor::new(),
        )
        .unwrap(),
    )
}

#[test]
fn test_list_bag_hash_agree_on_membership() {
    let values = vec![4, 8, 15, 16, 23, 42];

    let list = list_area(true);
    let bag = SweepArea::new(
        DefaultSweepArea::new(
            0,
            true,
            vec![match_value(), match_value()],
            vec![below(), below()],
            Predicate::equality(),
            BagImplementor::new(),
        )
        .unwrap(),
    );
    let hash_fns = vec![
        HashFunction::from_fn(|v: &i32| (*v % 7) as u64),
        HashFunction::from_fn(|v: &i32| (*v % 7) as u64),
    ];
    let hash = SweepArea::new(
        DefaultSweepArea::new(
            0,
            true,
            vec![match_value(), match_value()],
            vec![below(), below()],
            Predicate::equality(),
            HashImplementor::new(hash_fns).unwrap(),
        )
        .unwrap(),
    );

    for area in [&list, &bag, &hash] {
        for v in &values {
            area.insert(*v).unwrap();
        }
        assert_eq!(area.size().unwrap(), values.len());
        for v in &values {
            let hits: Vec<i32> = area.query(v, 1).unwrap().map(|r| r.unwrap()).collect();
            assert_eq!(hits, vec![*v]);
        }
        let misses: Vec<i32> = area.query(&99, 1).unwrap().map(|r| r.unwrap()).collect();
        assert!(misses.is_empty());
    }
}

#[test]
fn test_reorganization_postcondition_across_implementors() {
    let area = list_area(true);
    for v in [5, 1, 9, 3, 7, 2] {
        area.insert(v).unwrap();
    }
    area.reorganize(&6, 1).unwrap();
    let remaining: Vec<i32> = area.iter().unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(remaining, vec![9, 7]);
}

#[test]
fn test_memory_bound_holds_under_churn() {
    let managed =
        MemoryManagedSweepArea::new(list_area(true), 400, ObjectSize::Bytes(10)).unwrap();
    let metrics = MetricsRegistry::new();
    managed.set_metrics(metrics.clone());

    for v in 0..500 {
        managed.insert(v).unwrap();
        assert!(managed.memory_usage().unwrap() <= 400);
    }
    // plenty was shed along the way, yet the survivors are queryable
    assert!(metrics.get(zweep::common::constants::ELEMENTS_SHED) > 0);
    let survivors: Vec<i32> = managed.iter().unwrap().map(|r| r.unwrap()).collect();
    assert!(!survivors.is_empty());
    for v in &survivors {
        let hits: Vec<i32> = managed.query(v, 1).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(hits, vec![*v]);
    }
}

#[test]
fn test_expire_streams_remove_lazily() {
    let area = list_area(true);
    for v in 1..=6 {
        area.insert(v).unwrap();
    }
    let mut expired = area.expire(&4, 1).unwrap();
    assert_eq!(area.size().unwrap(), 6);
    assert_eq!(expired.next().unwrap().unwrap(), 1);
    assert_eq!(area.size().unwrap(), 5);
    drop(expired);
    // the rest stays until someone pulls it
    assert_eq!(area.size().unwrap(), 5);
}

#[test]
fn test_closed_area_rejects_operations() {
    let area = list_area(true);
    area.insert(1).unwrap();
    area.close().unwrap();
    assert_eq!(area.insert(2).unwrap_err().kind(), &ErrorKind::Closed);
    assert_eq!(area.size().unwrap_err().kind(), &ErrorKind::Closed);
}
