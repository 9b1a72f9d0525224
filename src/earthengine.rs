pub mod expression;
mod provider;
pub use provider::Provider;

use crate::composite::{Composite, CompositeMethod, CompositeRequest, DownloadOptions, ImageInfo};
use crate::error::DownloaderError;
use anyhow::{anyhow, Result};
use expression::{array, constant, invoke, Expression, ExpressionBuilder, ValueNode};
use serde_json::Value;

pub const DEFAULT_API_URL: &str = "https://earthengine.googleapis.com/v1/";

/// Sentinel-2 scene property holding the percentage of cloudy pixels in the granule.
const CLOUDY_PIXEL_PERCENTAGE: &str = "CLOUDY_PIXEL_PERCENTAGE";

/// Sentinel-2 cloud bitmask: bit 10 opaque clouds, bit 11 cirrus.
const CLOUD_MASK_BAND: &str = "QA60";

/// Native resolution of the cloud bitmask in metres.
const CLOUD_MASK_SCALE: f64 = 60.0;

const QUALITY_BAND: &str = "CLOUD_FREE";

/// Image property holding the clear fraction of the composite region.
const CLOUDLESS_PORTION: &str = "CLOUDLESS_PORTION";

const MAPPING_VAR: &str = "_MAPPING_VAR_0_0";

/// Converts a GeoJSON geometry into the matching `GeometryConstructors` invocation.
pub fn geometry(geojson: &Value) -> Result<ValueNode> {
    let kind = geojson
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DownloaderError::UnsupportedGeometry(
            "missing \"type\"".to_string(),
        ))?;
    let coordinates = geojson
        .get("coordinates")
        .ok_or(DownloaderError::UnsupportedGeometry(format!(
            "{kind} without \"coordinates\""
        )))?
        .clone();
    let node = match kind {
        "Point" | "MultiPoint" | "LineString" | "MultiLineString" => invoke(
            &format!("GeometryConstructors.{kind}"),
            [("coordinates", constant(coordinates))],
        ),
        "Polygon" | "MultiPolygon" => invoke(
            &format!("GeometryConstructors.{kind}"),
            [
                ("coordinates", constant(coordinates)),
                ("evenOdd", constant(true)),
            ],
        ),
        other => return Err(DownloaderError::UnsupportedGeometry(other.to_string()).into()),
    };
    Ok(node)
}

/// Upper bound on the scene cloud percentage for a given cloud-free fraction.
pub fn max_cloudy_percentage(cloudless_portion: f64) -> f64 {
    ((1.0 - cloudless_portion) * 100.0).clamp(0.0, 100.0)
}

fn filtered_collection(request: &CompositeRequest) -> Result<ValueNode> {
    let collection = invoke(
        "ImageCollection.load",
        [("id", constant(request.collection.as_str()))],
    );
    let by_date = invoke(
        "Collection.filter",
        [
            ("collection", collection),
            (
                "filter",
                invoke(
                    "Filter.dateRangeContains",
                    [
                        (
                            "leftValue",
                            invoke(
                                "DateRange",
                                [
                                    ("start", constant(request.start_date.as_str())),
                                    ("end", constant(request.end_date.as_str())),
                                ],
                            ),
                        ),
                        ("rightField", constant("system:time_start")),
                    ],
                ),
            ),
        ],
    );
    let by_region = invoke(
        "Collection.filter",
        [
            ("collection", by_date),
            (
                "filter",
                invoke(
                    "Filter.intersects",
                    [
                        ("leftField", constant(".all")),
                        ("rightValue", geometry(&request.region)?),
                    ],
                ),
            ),
        ],
    );
    let by_cloud = invoke(
        "Collection.filter",
        [
            ("collection", by_region),
            (
                "filter",
                invoke(
                    "Filter.lessThanOrEquals",
                    [
                        ("leftField", constant(CLOUDY_PIXEL_PERCENTAGE)),
                        (
                            "rightValue",
                            constant(max_cloudy_percentage(request.cloudless_portion)),
                        ),
                    ],
                ),
            ),
        ],
    );
    Ok(by_cloud)
}

/// The filtered collection, evaluated by `value:compute` to list the matching images.
pub fn search_expression(request: &CompositeRequest) -> Result<Expression> {
    let collection = filtered_collection(request)?;
    Ok(ExpressionBuilder::new().build(collection))
}

fn composite_image(builder: &mut ExpressionBuilder, composite: &Composite) -> Result<ValueNode> {
    let collection = filtered_collection(&composite.request)?;
    let region = geometry(&composite.region)?;
    match composite.method {
        CompositeMethod::QMosaic => {
            // Score each pixel 1 where the cloud bitmask is clear, 0 otherwise, and tag the
            // image with the clear fraction of the region.
            let add_quality = builder.function(MAPPING_VAR, |image| {
                let mask = invoke(
                    "Image.select",
                    [
                        ("input", image.clone()),
                        ("bandSelectors", constant(vec![CLOUD_MASK_BAND])),
                    ],
                );
                let zero = invoke("Image.constant", [("value", constant(0))]);
                let is_clear = invoke("Image.eq", [("image1", mask), ("image2", zero)]);
                let clear = invoke(
                    "Image.rename",
                    [("input", is_clear), ("names", constant(vec![QUALITY_BAND]))],
                );
                let stats = invoke(
                    "Image.reduceRegion",
                    [
                        ("image", clear.clone()),
                        ("reducer", invoke("Reducer.mean", [])),
                        ("geometry", region),
                        ("scale", constant(CLOUD_MASK_SCALE)),
                        ("bestEffort", constant(true)),
                    ],
                );
                let portion = invoke(
                    "Dictionary.get",
                    [("dictionary", stats), ("key", constant(QUALITY_BAND))],
                );
                invoke(
                    "Element.set",
                    [
                        (
                            "object",
                            invoke("Image.addBands", [("dstImg", image), ("srcImg", clear)]),
                        ),
                        ("key", constant(CLOUDLESS_PORTION)),
                        ("value", portion),
                    ],
                )
            });
            let scored = invoke(
                "Collection.map",
                [("collection", collection), ("baseAlgorithm", add_quality)],
            );
            // Clearest image last, so it lands on top where pixel scores tie.
            let sorted = invoke(
                "Collection.sort",
                [
                    ("collection", scored),
                    ("key", constant(CLOUDLESS_PORTION)),
                    ("ascending", constant(true)),
                ],
            );
            Ok(invoke(
                "ImageCollection.qualityMosaic",
                [
                    ("collection", sorted),
                    ("qualityBand", constant(QUALITY_BAND)),
                ],
            ))
        }
    }
}

/// The composite selected to the download bands, clipped to the region and reprojected.
pub fn download_expression(
    composite: &Composite,
    options: &DownloadOptions,
) -> Result<Expression> {
    let mut builder = ExpressionBuilder::new();
    let image = composite_image(&mut builder, composite)?;
    if options.bands.is_empty() {
        return Err(anyhow!("No bands selected for download"));
    }
    let bands = array(options.bands.iter().map(|b| constant(b.as_str())).collect());
    let selected = invoke("Image.select", [("input", image), ("bandSelectors", bands)]);
    let clipped = invoke(
        "Image.clip",
        [("input", selected), ("geometry", geometry(&options.region)?)],
    );
    let reprojected = invoke(
        "Image.reproject",
        [
            ("image", clipped),
            (
                "crs",
                invoke("Projection", [("crs", constant(options.crs.as_str()))]),
            ),
            ("scale", constant(options.scale)),
        ],
    );
    Ok(builder.build(reprojected))
}

/// Reads the image listing out of an evaluated `ImageCollection`.
pub fn parse_images(collection: &Value) -> Result<Vec<ImageInfo>> {
    let features = collection
        .get("features")
        .and_then(Value::as_array)
        .ok_or(anyhow!("Search result is not an image collection"))?;
    features
        .iter()
        .map(|feature| {
            let id = feature
                .get("id")
                .and_then(Value::as_str)
                .ok_or(anyhow!("Image without id in search result"))?
                .to_string();
            let properties = feature.get("properties");
            let property = |key: &str| properties.and_then(|p| p.get(key));
            Ok(ImageInfo {
                id,
                time_start: property("system:time_start").and_then(Value::as_i64),
                cloudy_pixel_percentage: property(CLOUDY_PIXEL_PERCENTAGE).and_then(Value::as_f64),
            })
        })
        .collect::<Result<Vec<_>>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    fn square() -> Value {
        json!({"type":"Polygon","coordinates":[[[0,0],[0,1],[1,1],[1,0],[0,0]]]})
    }

    fn request() -> CompositeRequest {
        CompositeRequest::new(square(), "2023-01-01", "2023-03-01")
    }

    #[test]
    fn test_polygon_geometry() {
        let node = serde_json::to_value(geometry(&square()).unwrap()).unwrap();
        assert_eq!(
            node["functionInvocationValue"]["functionName"],
            "GeometryConstructors.Polygon"
        );
        assert_eq!(
            node["functionInvocationValue"]["arguments"]["coordinates"]["constantValue"],
            square()["coordinates"]
        );
    }

    #[test]
    fn test_unsupported_geometry() {
        let err = geometry(&json!({"type": "GeometryCollection", "geometries": []})).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DownloaderError>(),
            Some(DownloaderError::UnsupportedGeometry(_))
        ));
    }

    #[test]
    fn test_max_cloudy_percentage() {
        assert_eq!(max_cloudy_percentage(0.5), 50.0);
        assert_eq!(max_cloudy_percentage(1.0), 0.0);
        assert_eq!(max_cloudy_percentage(1.5), 0.0);
    }

    #[test]
    fn test_search_expression_filters() {
        let expression = search_expression(&request()).unwrap();
        let text = serde_json::to_string(&expression).unwrap();
        assert!(text.contains(r#""functionName":"ImageCollection.load""#));
        assert!(text.contains(r#""constantValue":"COPERNICUS/S2""#));
        assert!(text.contains(r#""constantValue":"2023-01-01""#));
        assert!(text.contains(r#""constantValue":"2023-03-01""#));
        assert!(text.contains(r#""constantValue":"CLOUDY_PIXEL_PERCENTAGE""#));
        assert!(text.contains(r#""constantValue":50.0"#));
        assert!(text.contains(r#""functionName":"Filter.intersects""#));
    }

    #[test]
    fn test_download_expression() {
        let composite = Composite {
            request: request(),
            method: CompositeMethod::QMosaic,
            region: square(),
        };
        let options = DownloadOptions::new(Path::new("out.tif"), square());
        let expression = download_expression(&composite, &options).unwrap();
        let value = serde_json::to_value(&expression).unwrap();

        let result = &value["values"][expression.result.as_str()]["functionInvocationValue"];
        assert_eq!(result["functionName"], "Image.reproject");
        assert_eq!(result["arguments"]["scale"]["constantValue"], 10.0);
        assert_eq!(
            result["arguments"]["crs"]["functionInvocationValue"]["arguments"]["crs"]
                ["constantValue"],
            "EPSG:4326"
        );

        let text = value.to_string();
        assert!(text.contains(r#""functionName":"ImageCollection.qualityMosaic""#));
        assert!(text.contains(r#""argumentNames":["_MAPPING_VAR_0_0"]"#));
        assert!(text.contains(r#""constantValue":"B8A""#));
    }

    fn invocation<'a>(node: &'a Value, name: &str) -> &'a Value {
        let invocation = &node["functionInvocationValue"];
        assert_eq!(invocation["functionName"], name);
        &invocation["arguments"]
    }

    #[test]
    fn test_quality_mosaic_sorts_by_region_cloudless_portion() {
        let far_square = json!({
            "type": "Polygon",
            "coordinates": [[[50, 50], [50, 51], [51, 51], [51, 50], [50, 50]]]
        });
        let composite = |region: Value| Composite {
            request: request(),
            method: CompositeMethod::QMosaic,
            region,
        };
        let options = DownloadOptions::new(Path::new("out.tif"), square());

        let near = download_expression(&composite(square()), &options).unwrap();
        let far = download_expression(&composite(far_square.clone()), &options).unwrap();
        assert_ne!(near, far);

        let value = serde_json::to_value(&far).unwrap();
        let reproject = invocation(&value["values"][far.result.as_str()], "Image.reproject");
        let clip = invocation(&reproject["image"], "Image.clip");
        let select = invocation(&clip["input"], "Image.select");
        let mosaic = invocation(&select["input"], "ImageCollection.qualityMosaic");
        assert_eq!(mosaic["qualityBand"]["constantValue"], "CLOUD_FREE");

        let sort = invocation(&mosaic["collection"], "Collection.sort");
        assert_eq!(sort["key"]["constantValue"], "CLOUDLESS_PORTION");
        assert_eq!(sort["ascending"]["constantValue"], true);

        let map = invocation(&sort["collection"], "Collection.map");
        let body = map["baseAlgorithm"]["functionDefinitionValue"]["body"]
            .as_str()
            .unwrap();
        let set = invocation(&value["values"][body], "Element.set");
        assert_eq!(set["key"]["constantValue"], "CLOUDLESS_PORTION");
        let get = invocation(&set["value"], "Dictionary.get");
        let reduce = invocation(&get["dictionary"], "Image.reduceRegion");
        let region = invocation(&reduce["geometry"], "GeometryConstructors.Polygon");
        assert_eq!(
            region["coordinates"]["constantValue"],
            far_square["coordinates"]
        );
    }

    #[test]
    fn test_parse_images() {
        let collection = json!({
            "type": "ImageCollection",
            "features": [
                {
                    "type": "Image",
                    "id": "COPERNICUS/S2/a",
                    "properties": {
                        "system:time_start": 1672913641000i64,
                        "CLOUDY_PIXEL_PERCENTAGE": 12.5
                    }
                },
                {"type": "Image", "id": "COPERNICUS/S2/b"}
            ]
        });
        let images = parse_images(&collection).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].time_start, Some(1672913641000));
        assert_eq!(images[0].cloudy_pixel_percentage, Some(12.5));
        assert_eq!(images[1].id, "COPERNICUS/S2/b");
        assert_eq!(images[1].time_start, None);
    }
}
