use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::error::TrackerError;
use crate::models::GeoPoint;

/// Encode a route or a traveled path as a base64 GPX 1.1 single-segment track.
pub fn encode_path_as_gpx(path: &[GeoPoint], name: &str) -> Result<String, TrackerError> {
    let mut buffer = Vec::new();
    write_path_as_gpx(path, name, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

pub fn write_path_as_gpx<W: Write>(path: &[GeoPoint], name: &str, writer: W) -> Result<(), TrackerError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("tracker".into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some(name.into()),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    segment.points.extend(path.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    gpx::write(&gpx, writer)?;
    Ok(())
}

fn to_waypoint(point: &GeoPoint) -> Waypoint {
    Waypoint::new(Point::new(point.lon, point.lat))
}
