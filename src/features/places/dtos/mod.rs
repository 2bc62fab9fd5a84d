mod place_dto;

pub use place_dto::{
    apply_clear_sentinel, CreatePlaceParams, PlaceFilter, PlaceSort, PlaceView,
    SetPlaceLocaleParams, UpdatePlaceParams,
};
