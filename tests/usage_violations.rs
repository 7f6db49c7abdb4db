//! Contract violations panic. These run on a single rank so the panic cannot
//! leave a peer blocked.

use dranges::{algorithms, Context, ContextConfig, Distribution, DistributedVector, Fabric, LocalRange, Segment};

fn one_rank(body: impl Fn(&Context) + Sync) {
    Fabric::run(1, |comm| {
        let ctx = Context::init(comm, ContextConfig::host()).unwrap();
        body(&ctx);
    });
}

#[test]
#[should_panic(expected = "does not own")]
fn test_local_access_to_foreign_segment() {
    one_rank(|ctx| {
        let v = DistributedVector::<u32>::new(ctx, 4).unwrap();
        let _ = (&v).into_local(&[Segment::new(1, 0, 2)]).count();
    });
}

#[test]
#[should_panic(expected = "without a matching begin")]
fn test_halo_finalize_without_begin() {
    one_rank(|ctx| {
        let mut v = DistributedVector::<u32>::with_distribution(ctx, 6, Distribution::new().halo(1)).unwrap();
        v.exchange_finalize();
    });
}

#[test]
#[should_panic(expected = "does not fit the value type")]
fn test_iota_past_the_value_range() {
    one_rank(|ctx| {
        let mut v = DistributedVector::<u8>::new(ctx, 300).unwrap();
        algorithms::iota(ctx, &mut v, 0u8);
    });
}

#[test]
#[should_panic(expected = "out of range")]
fn test_get_past_the_end() {
    one_rank(|ctx| {
        let v = DistributedVector::<u8>::new(ctx, 3).unwrap();
        let _ = dranges::DistributedRange::get(&v, 3);
    });
}

#[test]
fn test_zero_granularity_is_an_error_not_a_panic() {
    one_rank(|ctx| {
        let err = DistributedVector::<u8>::with_distribution(ctx, 3, Distribution::new().granularity(0));
        assert!(matches!(err, Err(dranges::DrError::Config(_))));
    });
}
