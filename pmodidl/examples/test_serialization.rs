use pmodidl::{ContentObject, DidlMetadata, TagValue, parse_metadata};

fn main() {
    let track = ContentObject::new_item("track-1", "album-1")
        .with_tag("dc:title", TagValue::new("Test Song"))
        .with_tag("upnp:artist", TagValue::new("Test Artist"))
        .with_tag("upnp:class", TagValue::new("object.item.audioItem.musicTrack"))
        .with_tag(
            "res",
            TagValue::new("http://example.com/song.flac")
                .with_attribute("protocolInfo", "http-get:*:audio/flac:*")
                .with_attribute("duration", "0:03:45.000"),
        );

    println!("=== DIDL-Lite ===");
    let xml = match track.to_didl() {
        Ok(xml) => xml,
        Err(e) => {
            eprintln!("serialization failed: {e}");
            return;
        }
    };
    println!("{xml}");

    println!("\n=== Parsed back, as JSON ===");
    match parse_metadata::<pmodidl::DidlDocument>(&xml) {
        Ok(metadata) => {
            let metadata: DidlMetadata = metadata;
            match serde_json::to_string_pretty(&metadata.data) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("json failed: {e}"),
            }
        }
        Err(e) => eprintln!("parse failed: {e}"),
    }
}
