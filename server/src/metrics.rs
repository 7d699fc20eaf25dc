use ::cadence::Counted;

pub fn make_udp_client(
    address: &str,
    port: u16,
) -> ::anyhow::Result<::cadence::StatsdClient> {
    let socket = ::std::net::UdpSocket::bind("0.0.0.0:0")?;
    socket.set_nonblocking(true)?;

    let sink =
        ::cadence::BufferedUdpMetricSink::from((address, port), socket)?;
    let queuing_sink = ::cadence::QueuingMetricSink::from(sink);

    Ok(::cadence::StatsdClient::from_sink("agora", queuing_sink))
}

pub fn make_nop_client() -> ::cadence::StatsdClient {
    ::cadence::StatsdClient::from_sink("agora", ::cadence::NopMetricSink)
}

pub fn count(client: &::cadence::StatsdClient, key: &str) {
    match client.count(key, 1) {
        Ok(_) => {}
        Err(err) => {
            ::log::warn!("Unable to log {} metric due to: {}", key, err)
        }
    };
}

pub fn count_by(client: &::cadence::StatsdClient, key: &str, value: i64) {
    if let Err(err) = client.count(key, value) {
        ::log::warn!("Unable to log {} metric due to: {}", key, err)
    }
}
