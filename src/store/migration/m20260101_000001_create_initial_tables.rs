//! Initial schema: hubs, works, editions, media assets, claims,
//! canonical values, provider registrations, transaction log.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(Hubs::Table)
					.if_not_exists()
					.col(ColumnDef::new(Hubs::Id).string().not_null().primary_key())
					.col(ColumnDef::new(Hubs::UniverseId).string())
					.col(ColumnDef::new(Hubs::DisplayName).string().not_null())
					.col(
						ColumnDef::new(Hubs::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.if_not_exists()
					.name("idx_hubs_display_name")
					.table(Hubs::Table)
					.col(Hubs::DisplayName)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Works::Table)
					.if_not_exists()
					.col(ColumnDef::new(Works::Id).string().not_null().primary_key())
					.col(ColumnDef::new(Works::HubId).string())
					.col(ColumnDef::new(Works::MediaType).string().not_null())
					.col(ColumnDef::new(Works::SequenceIndex).integer())
					.col(
						ColumnDef::new(Works::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.foreign_key(
						ForeignKey::create()
							.name("fk_works_hub")
							.from(Works::Table, Works::HubId)
							.to(Hubs::Table, Hubs::Id)
							.on_delete(ForeignKeyAction::SetNull),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.if_not_exists()
					.name("idx_works_hub_id")
					.table(Works::Table)
					.col(Works::HubId)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Editions::Table)
					.if_not_exists()
					.col(ColumnDef::new(Editions::Id).string().not_null().primary_key())
					.col(ColumnDef::new(Editions::WorkId).string().not_null())
					.col(ColumnDef::new(Editions::FormatLabel).string())
					.col(
						ColumnDef::new(Editions::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.foreign_key(
						ForeignKey::create()
							.name("fk_editions_work")
							.from(Editions::Table, Editions::WorkId)
							.to(Works::Table, Works::Id)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(MediaAssets::Table)
					.if_not_exists()
					.col(ColumnDef::new(MediaAssets::Id).string().not_null().primary_key())
					.col(ColumnDef::new(MediaAssets::EditionId).string().not_null())
					.col(
						ColumnDef::new(MediaAssets::ContentHash)
							.string()
							.not_null()
							.unique_key(),
					)
					.col(ColumnDef::new(MediaAssets::FilePathRoot).string().not_null())
					.col(ColumnDef::new(MediaAssets::Status).string().not_null())
					.col(ColumnDef::new(MediaAssets::Manifest).json())
					.col(
						ColumnDef::new(MediaAssets::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.foreign_key(
						ForeignKey::create()
							.name("fk_assets_edition")
							.from(MediaAssets::Table, MediaAssets::EditionId)
							.to(Editions::Table, Editions::Id)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(MetadataClaims::Table)
					.if_not_exists()
					.col(ColumnDef::new(MetadataClaims::Id).string().not_null().primary_key())
					.col(ColumnDef::new(MetadataClaims::EntityKind).string().not_null())
					.col(ColumnDef::new(MetadataClaims::EntityId).string().not_null())
					.col(ColumnDef::new(MetadataClaims::ProviderId).string().not_null())
					.col(ColumnDef::new(MetadataClaims::ClaimKey).string().not_null())
					.col(ColumnDef::new(MetadataClaims::ClaimValue).string().not_null())
					.col(ColumnDef::new(MetadataClaims::Confidence).double().not_null())
					.col(
						ColumnDef::new(MetadataClaims::ClaimedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(MetadataClaims::IsUserLocked)
							.boolean()
							.not_null()
							.default(false),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.if_not_exists()
					.name("idx_claims_entity")
					.table(MetadataClaims::Table)
					.col(MetadataClaims::EntityKind)
					.col(MetadataClaims::EntityId)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(CanonicalValues::Table)
					.if_not_exists()
					.col(ColumnDef::new(CanonicalValues::EntityKind).string().not_null())
					.col(ColumnDef::new(CanonicalValues::EntityId).string().not_null())
					.col(ColumnDef::new(CanonicalValues::Key).string().not_null())
					.col(ColumnDef::new(CanonicalValues::Value).string().not_null())
					.col(
						ColumnDef::new(CanonicalValues::LastScoredAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.primary_key(
						Index::create()
							.col(CanonicalValues::EntityKind)
							.col(CanonicalValues::EntityId)
							.col(CanonicalValues::Key),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(ProviderRegistrations::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(ProviderRegistrations::Id)
							.string()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(ProviderRegistrations::Name).string().not_null())
					.col(
						ColumnDef::new(ProviderRegistrations::Enabled)
							.boolean()
							.not_null()
							.default(true),
					)
					.col(
						ColumnDef::new(ProviderRegistrations::DefaultWeight)
							.double()
							.not_null()
							.default(1.0),
					)
					.col(
						ColumnDef::new(ProviderRegistrations::FieldWeights)
							.json()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(TransactionLog::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(TransactionLog::Id)
							.big_integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(TransactionLog::EventType).string().not_null())
					.col(ColumnDef::new(TransactionLog::EntityType).string().not_null())
					.col(ColumnDef::new(TransactionLog::EntityId).string().not_null())
					.col(
						ColumnDef::new(TransactionLog::OccurredAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.if_not_exists()
					.name("idx_txlog_occurred_at")
					.table(TransactionLog::Table)
					.col(TransactionLog::OccurredAt)
					.to_owned(),
			)
			.await?;

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(TransactionLog::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(ProviderRegistrations::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(CanonicalValues::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(MetadataClaims::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(MediaAssets::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Editions::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Works::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Hubs::Table).to_owned())
			.await?;
		Ok(())
	}
}

#[derive(DeriveIden)]
enum Hubs {
	Table,
	Id,
	UniverseId,
	DisplayName,
	CreatedAt,
}

#[derive(DeriveIden)]
enum Works {
	Table,
	Id,
	HubId,
	MediaType,
	SequenceIndex,
	CreatedAt,
}

#[derive(DeriveIden)]
enum Editions {
	Table,
	Id,
	WorkId,
	FormatLabel,
	CreatedAt,
}

#[derive(DeriveIden)]
enum MediaAssets {
	Table,
	Id,
	EditionId,
	ContentHash,
	FilePathRoot,
	Status,
	Manifest,
	CreatedAt,
}

#[derive(DeriveIden)]
enum MetadataClaims {
	Table,
	Id,
	EntityKind,
	EntityId,
	ProviderId,
	ClaimKey,
	ClaimValue,
	Confidence,
	ClaimedAt,
	IsUserLocked,
}

#[derive(DeriveIden)]
enum CanonicalValues {
	Table,
	EntityKind,
	EntityId,
	Key,
	Value,
	LastScoredAt,
}

#[derive(DeriveIden)]
enum ProviderRegistrations {
	Table,
	Id,
	Name,
	Enabled,
	DefaultWeight,
	FieldWeights,
}

#[derive(DeriveIden)]
enum TransactionLog {
	Table,
	Id,
	EventType,
	EntityType,
	EntityId,
	OccurredAt,
}
