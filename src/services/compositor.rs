//! Places one decoded raster on a page of exactly its own size.
//!
//! One pixel maps to one PDF unit, so an 800x600 image becomes an 800x600
//! point page with the image drawn edge to edge.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::AppResult;
use crate::services::decoder::DecodedRaster;

const IMAGE_RESOURCE: &[u8] = b"Im0";

/// Adds the image XObject, its content stream and the page object.
/// The caller owns linking the returned page into the `/Kids` array.
pub fn compose_page(
    doc: &mut Document,
    pages_id: ObjectId,
    raster: DecodedRaster,
) -> AppResult<ObjectId> {
    let width = raster.width as i64;
    let height = raster.height as i64;

    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
        },
        raster.pixels,
    );
    let image_id = doc.add_object(image);

    // Unit square scaled to the full page at the origin.
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(height),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), content.encode()?));

    let mut xobjects = lopdf::Dictionary::new();
    xobjects.set(IMAGE_RESOURCE, Object::Reference(image_id));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width),
            Object::Integer(height),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => xobjects,
        },
    });

    Ok(page_id)
}
