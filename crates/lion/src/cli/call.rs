//! `lion call` and `lion peers`: poke the mesh from the command line.

use lion::transport;
use lion::{
    Args, LionResult, PeerId, Reply, Request, ServerLink, TalkConfig, TalkError, TalkErrorKind,
};
use serde_json::Value;

/// Turn a JSON argument string into route arguments.
///
/// An array becomes positional arguments, an object keyword arguments, and
/// any other value a single positional argument.
pub fn parse_args(raw: Option<&str>) -> LionResult<Args> {
    let Some(raw) = raw else {
        return Ok(Args::new());
    };
    let value: Value = serde_json::from_str(raw).map_err(TalkError::from)?;
    Ok(match value {
        Value::Array(values) => values
            .into_iter()
            .fold(Args::new(), |args, value| args.arg(value)),
        Value::Object(map) => map
            .into_iter()
            .fold(Args::new(), |args, (name, value)| args.kwarg(name, value)),
        other => Args::new().arg(other),
    })
}

/// Resolve `peer` through the server, send one request and print the reply.
pub async fn handle_call_command(
    config: &TalkConfig,
    peer: &str,
    route: &str,
    args: Option<&str>,
    no_wait: bool,
) -> LionResult<()> {
    let peer = PeerId::from(peer);
    let request = Request::new(route, parse_args(args)?);

    let link = ServerLink::new(config.server.clone());
    let address = link
        .whereis(&peer)
        .await?
        .ok_or_else(|| TalkError::new(TalkErrorKind::UnknownPeer(peer.to_string())))?;
    tracing::debug!(%peer, %address, route, "Sending request");

    match transport::send_request(&address, &request, !no_wait).await? {
        None => println!("sent"),
        Some(Reply::Empty) => println!("(empty)"),
        Some(Reply::Value(bytes)) => match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => println!("{value}"),
            Err(_) => println!("{}", String::from_utf8_lossy(&bytes)),
        },
        Some(Reply::Error(message)) => {
            return Err(TalkError::new(TalkErrorKind::Remote(message)).into());
        }
    }
    Ok(())
}

/// Print the server's directory as JSON.
pub async fn handle_peers_command(config: &TalkConfig) -> LionResult<()> {
    let peers = ServerLink::new(config.server.clone()).peers().await?;
    let rendered = serde_json::to_string_pretty(&peers).map_err(TalkError::from)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args_shapes() {
        assert!(parse_args(None).unwrap().is_empty());

        let positional = parse_args(Some(r#"["leo_01_00", 3]"#)).unwrap();
        assert_eq!(positional.args.len(), 2);
        assert_eq!(positional.get::<u32>(1, "count").unwrap(), 3);

        let keyword = parse_args(Some(r#"{"event_name": "reload"}"#)).unwrap();
        assert_eq!(keyword.get::<String>(0, "event_name").unwrap(), "reload");

        let single = parse_args(Some("42")).unwrap();
        assert_eq!(single.get::<i64>(0, "n").unwrap(), 42);
    }

    #[test]
    fn test_parse_args_rejects_bad_json() {
        assert!(parse_args(Some("[unterminated")).is_err());
    }
}
