/// Medicine Routes
///
/// Private CRUD over the signed-in user's medicine list. Every query is
/// scoped to the identity injected by the session guard.

use actix_web::{web, HttpResponse};

use crate::auth::Identity;
use crate::error::{AppError, CredentialError, ValidationError};
use crate::routes::MessageResponse;
use crate::store::{MedicineStore, NewMedicine};
use crate::validators::is_valid_medicine_field;

/// GET /api/user/medicine
pub async fn get_medicines(
    identity: web::ReqData<Identity>,
    store: web::Data<dyn MedicineStore>,
) -> Result<HttpResponse, AppError> {
    let medicines = store.list_medicines(&identity).await?;
    Ok(HttpResponse::Ok().json(medicines))
}

/// POST /api/user/medicine
pub async fn create_medicine(
    identity: web::ReqData<Identity>,
    form: web::Json<NewMedicine>,
    store: web::Data<dyn MedicineStore>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    if form.interval < 0 {
        return Err(ValidationError::InvalidFormat("interval").into());
    }

    let medicine = NewMedicine {
        name: is_valid_medicine_field("name", &form.name, true)?,
        dosage: is_valid_medicine_field("dosage", &form.dosage, false)?,
        types: is_valid_medicine_field("types", &form.types, false)?,
        interval: form.interval,
    };

    let created = store.insert_medicine(&identity, &medicine).await?;
    tracing::info!(owner = %identity.as_str(), medicine_id = created.id, "Medicine added");

    Ok(HttpResponse::Ok().json(MessageResponse::ok("Medicine Added successfully")))
}

/// DELETE /api/user/medicine/{id}
pub async fn delete_medicine(
    identity: web::ReqData<Identity>,
    path: web::Path<i64>,
    store: web::Data<dyn MedicineStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    if !store.delete_medicine(&identity, id).await? {
        return Err(CredentialError::MedicineNotFound.into());
    }

    Ok(HttpResponse::Ok().json(MessageResponse::ok("Medicine deleted successfully")))
}
