use devcomm::{
    BufferView, CommError, Communicator, ElementType, GroupConfig, Layout, ReduceOp, StoreRole,
    StoreServer,
};
use std::time::Duration;

use super::helpers::{CountingProvider, CountingTransport, free_port, init_tracing, test_config};

/// A single-rank communicator over the counting transport, talking to a
/// store owned by the test so its traffic can be observed.
struct Fixture {
    comm: Communicator<CountingTransport>,
    provider: CountingProvider,
    server: StoreServer,
    bootstrap_requests: u64,
    _rt: tokio::runtime::Runtime,
}

impl Fixture {
    fn new() -> Self {
        init_tracing();
        let rt = tokio::runtime::Runtime::new().unwrap();
        let port = free_port();
        let server = rt
            .block_on(StoreServer::bind(format!("127.0.0.1:{port}").parse().unwrap()))
            .unwrap();
        let provider = CountingProvider::default();
        // A one-member group completes the bootstrap barrier alone.
        let group = GroupConfig::new(1, 0).unwrap();
        let config = test_config(port).with_store_timeout(Duration::from_secs(5));
        let comm =
            Communicator::init_with_role(&provider, group, &config, StoreRole::Participant).unwrap();
        let bootstrap_requests = server.requests_served();
        Fixture {
            comm,
            provider,
            server,
            bootstrap_requests,
            _rt: rt,
        }
    }

    /// Assert `result` is a validation error and nothing reached the transport or the store.
    fn assert_rejected(&self, result: devcomm::Result<()>) -> CommError {
        let err = result.unwrap_err();
        assert!(err.is_validation(), "not a validation error: {err:?}");
        assert_eq!(self.provider.calls(), 0, "transport was called");
        assert_eq!(
            self.server.requests_served(),
            self.bootstrap_requests,
            "store was called"
        );
        err
    }
}

fn strided(shape: &[usize]) -> BufferView {
    unsafe { BufferView::from_raw(0x1000, shape, ElementType::F32, Layout::STRIDED) }
}

fn contiguous(shape: &[usize], dtype: ElementType) -> BufferView {
    unsafe { BufferView::from_raw(0x2000, shape, dtype, Layout::C) }
}

#[test]
fn test_non_contiguous_rejected_everywhere() {
    let fx = Fixture::new();
    let bad = strided(&[4, 4]);
    let bad_rows = strided(&[1, 4]);
    let good = contiguous(&[16], ElementType::F32);
    let row = contiguous(&[4], ElementType::F32);
    let rows = contiguous(&[1, 4], ElementType::F32);
    let c = &fx.comm;

    let results = unsafe {
        vec![
            c.all_reduce(&bad, &good, ReduceOp::Sum, None),
            c.all_reduce(&good, &bad, ReduceOp::Sum, None),
            c.reduce(&bad, &good, 0, ReduceOp::Sum, None),
            c.broadcast(&bad, 0, None),
            c.reduce_scatter(&bad, &good, ReduceOp::Sum, None),
            c.all_gather(&good, &bad, None),
            c.send(&bad, 0, None),
            c.recv(&bad, 0, None),
            c.send_recv(&good, &bad, 0, None),
            c.send_recv(&bad, &good, 0, None),
            c.all_to_all(&bad, &good, None),
            c.all_to_all(&rows, &bad_rows, None),
            c.scatter(&bad_rows, &row, 0, None),
            c.scatter(&rows, &bad, 0, None),
            c.gather(&bad, &rows, 0, None),
            c.gather(&row, &bad_rows, 0, None),
        ]
    };
    for result in results {
        let err = fx.assert_rejected(result);
        assert!(matches!(err, CommError::Layout { .. }), "got {err:?}");
    }
}

#[test]
fn test_unsupported_type_named() {
    let fx = Fixture::new();
    for dtype in [ElementType::Bool, ElementType::I16, ElementType::BF16, ElementType::ComplexHalf] {
        let buf = contiguous(&[8], dtype);
        let err = fx.assert_rejected(unsafe { fx.comm.all_reduce(&buf, &buf, ReduceOp::Sum, None) });
        assert!(matches!(err, CommError::UnsupportedType { dtype: d } if d == dtype));
        assert!(err.to_string().contains(dtype.name()), "{err}");
    }
}

#[test]
fn test_scatter_shape_error_before_store_or_transport() {
    let fx = Fixture::new();
    let input = contiguous(&[2, 3], ElementType::F32);
    let output = contiguous(&[3], ElementType::F32);
    let err = fx.assert_rejected(unsafe { fx.comm.scatter(&input, &output, 0, None) });
    assert!(
        matches!(err, CommError::Shape { operation: "scatter", expected: 1, .. }),
        "got {err:?}"
    );
}

#[test]
fn test_gather_and_all_to_all_shapes() {
    let fx = Fixture::new();
    let single = contiguous(&[3], ElementType::I32);
    let wide = contiguous(&[2, 3], ElementType::I32);

    let err = fx.assert_rejected(unsafe { fx.comm.gather(&single, &wide, 0, None) });
    assert!(matches!(err, CommError::Shape { operation: "gather", .. }));

    let err = fx.assert_rejected(unsafe { fx.comm.all_to_all(&wide, &wide, None) });
    assert!(matches!(err, CommError::Shape { operation: "all_to_all", what: "input", .. }));
}

#[test]
fn test_mismatched_buffers() {
    let fx = Fixture::new();
    let a = contiguous(&[4], ElementType::F32);
    let b = contiguous(&[4], ElementType::F64);
    let short = contiguous(&[3], ElementType::F32);

    let err = fx.assert_rejected(unsafe { fx.comm.all_reduce(&a, &b, ReduceOp::Sum, None) });
    assert!(matches!(err, CommError::TypeMismatch { .. }));

    let err = fx.assert_rejected(unsafe { fx.comm.all_reduce(&a, &short, ReduceOp::Sum, None) });
    assert!(matches!(err, CommError::SizeMismatch { expected: 4, actual: 3, .. }));
}

#[test]
fn test_invalid_peer_and_root() {
    let fx = Fixture::new();
    let buf = contiguous(&[4], ElementType::U8);
    let err = fx.assert_rejected(unsafe { fx.comm.send(&buf, 1, None) });
    assert!(matches!(err, CommError::InvalidRank { rank: 1, world_size: 1 }));
    let err = fx.assert_rejected(unsafe { fx.comm.broadcast(&buf, 3, None) });
    assert!(matches!(err, CommError::InvalidRank { rank: 3, .. }));
}

#[test]
fn test_valid_call_reaches_transport() {
    let fx = Fixture::new();
    let buf = contiguous(&[4], ElementType::F32);
    unsafe { fx.comm.all_reduce(&buf, &buf, ReduceOp::Sum, None).unwrap() };
    assert_eq!(fx.provider.calls(), 1);

    // A composed op is bracketed: group_start, send, recv, group_end.
    unsafe { fx.comm.send_recv(&buf, &buf, 0, None).unwrap() };
    assert_eq!(fx.provider.calls(), 5);
}

#[test]
fn test_dropped_batch_closes_group() {
    let mut fx = Fixture::new();
    {
        let _batch = fx.comm.batch(None).unwrap();
    }
    // group_start + group_end from drop.
    assert_eq!(fx.provider.calls(), 2);
}

#[test]
fn test_batch_rejects_non_contiguous_after_open() {
    let mut fx = Fixture::new();
    let bad = strided(&[2, 2]);
    {
        let batch = fx.comm.batch(None).unwrap();
        assert_eq!(fx.provider.calls(), 1);

        for result in unsafe { [batch.send(&bad, 0), batch.recv(&bad, 0)] } {
            let err = result.unwrap_err();
            assert!(matches!(err, CommError::Layout { .. }), "got {err:?}");
        }
        // Nothing past group_start.
        assert_eq!(fx.provider.calls(), 1);
        batch.finish().unwrap();
    }
    assert_eq!(fx.provider.calls(), 2);
}
