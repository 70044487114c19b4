use criterion::{criterion_group, criterion_main};


criterion_group!(
    benches,
    coap::bench_encode_request,
    coap::bench_parse_response,
    mqtt::bench_publish,
    mqtt::bench_poll,
    mqtt::bench_publish_and_poll_qos0,
    mqtt::bench_publish_and_poll_qos1
);
criterion_main!(benches);
