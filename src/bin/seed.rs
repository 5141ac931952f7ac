use boutique_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Sample catalog. Each product carries a fixed id so reseeding is keyed on a
/// stable identifier instead of a name match.
fn sample_products() -> Vec<(Uuid, &'static str, &'static str, Decimal, i32)> {
    vec![
        (
            Uuid::from_u128(0x0b5e_0001),
            "Tomates Fraiches",
            "Tomates bio cultivees localement, parfaites pour vos salades et sauces.",
            dec!(250.00),
            25,
        ),
        (
            Uuid::from_u128(0x0b5e_0002),
            "Pain Artisanal",
            "Pain traditionnel cuit au four a bois, croute doree et mie moelleuse.",
            dec!(150.00),
            15,
        ),
        (
            Uuid::from_u128(0x0b5e_0003),
            "Fromage de Chevre",
            "Fromage de chevre affine, saveur douce et texture cremeuse.",
            dec!(1200.00),
            8,
        ),
        (
            Uuid::from_u128(0x0b5e_0004),
            "Miel Local",
            "Miel pur recolte dans nos ruches, saveur naturelle et authentique.",
            dec!(2500.00),
            12,
        ),
        (
            Uuid::from_u128(0x0b5e_0005),
            "Pommes Bio",
            "Pommes bio de saison, croquantes et juteuses.",
            dec!(300.00),
            30,
        ),
        (
            Uuid::from_u128(0x0b5e_0006),
            "Huile d'Olive Extra Vierge",
            "Huile d'olive pressee a froid, saveur intense et fruitee.",
            dec!(3500.00),
            10,
        ),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    // Ensure migrations are applied before seeding.
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let pool = create_pool(&config.database_url).await?;
    seed_products(&pool).await?;

    println!("Seed completed");
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for (id, name, description, price, stock) in sample_products() {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, stock)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
        println!("Ensured product {name}");
    }

    Ok(())
}
